//! ONNX inference sessions.

use std::path::Path;

use policy_core::Embedding;
use tract_onnx::prelude::*;
use tracing::debug;

use crate::error::{LocalError, Result};
use crate::pooling::pool_output;
use crate::tokenize::{EmbedTokenizer, TokenizedInput};

/// ONNX graph file expected in the model directory.
pub const MODEL_FILE: &str = "model.onnx";
/// Tokenizer definition expected in the model directory.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Optimised tract execution plan.
type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded model able to embed batches synchronously.
pub trait EmbeddingSession: Send + Sync {
    /// Embeds `texts`, one normalised vector per text.
    ///
    /// # Errors
    /// Returns an error if tokenization or inference fails.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

/// Sentence encoder running an ONNX graph through tract.
pub struct OnnxSession {
    model: TractModel,
    tokenizer: EmbedTokenizer,
    /// Whether the graph takes `token_type_ids` as its third input.
    uses_token_types: bool,
}

impl OnnxSession {
    /// Loads `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// # Errors
    /// Returns [`LocalError::Load`] if either file is missing or invalid.
    pub fn load(model_dir: &Path, max_tokens: usize) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        if !model_path.is_file() {
            return Err(LocalError::Load(format!(
                "{} does not exist",
                model_path.display()
            )));
        }

        let model = tract_onnx::onnx()
            .model_for_path(&model_path)
            .map_err(|error| LocalError::Load(error.to_string()))?
            .into_optimized()
            .map_err(|error| LocalError::Load(error.to_string()))?
            .into_runnable()
            .map_err(|error| LocalError::Load(error.to_string()))?;
        let uses_token_types = model.model().inputs.len() >= 3;

        let tokenizer = EmbedTokenizer::from_file(&model_dir.join(TOKENIZER_FILE), max_tokens)?;

        debug!(
            model = %model_path.display(),
            uses_token_types,
            "Loaded ONNX embedding model"
        );
        Ok(Self {
            model,
            tokenizer,
            uses_token_types,
        })
    }

    fn input_tensor<F>(inputs: &[TokenizedInput], seq_len: usize, field: F) -> Result<Tensor>
    where
        F: Fn(&TokenizedInput) -> &[i64],
    {
        let mut data = Vec::with_capacity(inputs.len() * seq_len);
        for input in inputs {
            data.extend_from_slice(field(input));
        }
        Tensor::from_shape(&[inputs.len(), seq_len], &data)
            .map_err(|error| LocalError::Shape(error.to_string()))
    }
}

impl EmbeddingSession for OnnxSession {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (padded, seq_len) = self.tokenizer.encode_batch(texts)?;

        let mut inputs: TVec<TValue> = tvec![
            Self::input_tensor(&padded, seq_len, |input| &input.input_ids)?.into(),
            Self::input_tensor(&padded, seq_len, |input| &input.attention_mask)?.into(),
        ];
        if self.uses_token_types {
            inputs.push(Self::input_tensor(&padded, seq_len, |input| &input.token_type_ids)?.into());
        }

        let outputs = self
            .model
            .run(inputs)
            .map_err(|error| LocalError::Inference(error.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| LocalError::Shape("model produced no outputs".to_owned()))?;
        let data = output
            .as_slice::<f32>()
            .map_err(|error| LocalError::Shape(error.to_string()))?;

        let masks: Vec<Vec<i64>> = padded.into_iter().map(|input| input.attention_mask).collect();
        pool_output(data, output.shape(), &masks)
    }
}

//! Tokenization for BERT-style encoders.

use std::iter::repeat_n;
use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{LocalError, Result};

/// Token ids and masks for one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedInput {
    /// Vocabulary ids.
    pub input_ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<i64>,
    /// Segment ids.
    pub token_type_ids: Vec<i64>,
}

impl TokenizedInput {
    /// Number of tokens including padding.
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether the input has no tokens.
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    fn truncate(&mut self, max_tokens: usize) {
        self.input_ids.truncate(max_tokens);
        self.attention_mask.truncate(max_tokens);
        self.token_type_ids.truncate(max_tokens);
    }
}

/// HuggingFace tokenizer bounded to the model's input length.
pub struct EmbedTokenizer {
    tokenizer: Tokenizer,
    max_tokens: usize,
}

impl EmbedTokenizer {
    /// Loads `tokenizer.json` from `path`.
    ///
    /// # Errors
    /// Returns [`LocalError::Load`] if the file is missing or invalid.
    pub fn from_file(path: &Path, max_tokens: usize) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|error| LocalError::Load(format!("{}: {error}", path.display())))?;
        Ok(Self {
            tokenizer,
            max_tokens: max_tokens.max(1),
        })
    }

    /// Tokenizes one text with special tokens, truncated to the token limit.
    ///
    /// # Errors
    /// Returns [`LocalError::Tokenizer`] if encoding fails.
    pub fn encode(&self, text: &str) -> Result<TokenizedInput> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|error| LocalError::Tokenizer(error.to_string()))?;

        let mut input = TokenizedInput {
            input_ids: encoding.get_ids().iter().map(|&id| i64::from(id)).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&mask| i64::from(mask))
                .collect(),
            token_type_ids: encoding
                .get_type_ids()
                .iter()
                .map(|&id| i64::from(id))
                .collect(),
        };
        input.truncate(self.max_tokens);
        Ok(input)
    }

    /// Tokenizes every text and pads the batch to a common length.
    ///
    /// # Errors
    /// Returns [`LocalError::Tokenizer`] if any text fails to encode.
    pub fn encode_batch(&self, texts: &[String]) -> Result<(Vec<TokenizedInput>, usize)> {
        let encoded = texts
            .iter()
            .map(|text| self.encode(text))
            .collect::<Result<Vec<_>>>()?;
        Ok(pad_batch(encoded))
    }
}

/// Pads every input with zeros to the longest length; returns the batch and that length.
pub fn pad_batch(inputs: Vec<TokenizedInput>) -> (Vec<TokenizedInput>, usize) {
    let seq_len = inputs.iter().map(TokenizedInput::len).max().unwrap_or(0);
    let padded = inputs
        .into_iter()
        .map(|mut input| {
            let padding = seq_len - input.len();
            input.input_ids.extend(repeat_n(0, padding));
            input.attention_mask.extend(repeat_n(0, padding));
            input.token_type_ids.extend(repeat_n(0, padding));
            input
        })
        .collect();
    (padded, seq_len)
}

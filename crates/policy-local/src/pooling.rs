//! Pooling and normalisation of transformer outputs.

use crate::error::{LocalError, Result};

/// Averages the token vectors of one sequence whose attention mask is set.
///
/// `tokens` is the row-major `[seq_len, hidden_size]` output of a single
/// sequence. A mask without set positions yields the zero vector.
pub fn mean_pool(tokens: &[f32], mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (row, &attended) in tokens.chunks_exact(hidden_size).zip(mask) {
        if attended > 0 {
            for (total, value) in sum.iter_mut().zip(row) {
                *total += value;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        sum.iter_mut().for_each(|value| *value /= count);
    }
    sum
}

/// Scales `vector` to unit length in place; zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
}

/// Pools a model output into one normalised vector per sequence.
///
/// Accepts token-level outputs `[batch, seq_len, hidden]`, which are
/// mean-pooled with `masks`, or already pooled outputs `[batch, hidden]`.
///
/// # Errors
/// Returns [`LocalError::Shape`] if the output does not match the batch.
pub fn pool_output(
    data: &[f32],
    shape: &[usize],
    masks: &[Vec<i64>],
) -> Result<Vec<Vec<f32>>> {
    let batch = masks.len();
    let mut vectors = match *shape {
        [rows, seq_len, hidden] if rows == batch && seq_len > 0 && hidden > 0 => {
            if data.len() != rows * seq_len * hidden {
                return Err(LocalError::Shape(format!(
                    "output holds {} values, expected {rows}x{seq_len}x{hidden}",
                    data.len()
                )));
            }
            data.chunks_exact(seq_len * hidden)
                .zip(masks)
                .map(|(tokens, mask)| mean_pool(tokens, mask, hidden))
                .collect::<Vec<_>>()
        }
        [rows, hidden] if rows == batch && hidden > 0 && data.len() == rows * hidden => data
            .chunks_exact(hidden)
            .map(<[f32]>::to_vec)
            .collect(),
        _ => {
            return Err(LocalError::Shape(format!(
                "unexpected output shape {shape:?} for a batch of {batch}"
            )));
        }
    };

    for vector in &mut vectors {
        l2_normalize(vector);
    }
    Ok(vectors)
}

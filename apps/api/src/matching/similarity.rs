//! Cosine similarity over embedding vectors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vector length mismatch: {left} vs {right}")]
pub struct LengthMismatch {
    pub left: usize,
    pub right: usize,
}

/// Cosine similarity of two equal-length vectors, clamped to `[0.0, 1.0]`.
///
/// Accumulates left-to-right in `f64`, so identical inputs always produce
/// identical scores. A zero-magnitude vector on either side scores `0.0`.
/// Negative cosines are floored to `0.0`; the sign is not carried through.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, LengthMismatch> {
    if a.len() != b.len() {
        return Err(LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_nan() {
        return Ok(0.0);
    }
    Ok(similarity.clamp(0.0, 1.0))
}

/// Integer percentage for a score in `[0, 1]`. Halves round away from zero.
pub fn match_percentage(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

//! Cosine similarity between speaker embeddings.

use crate::error::VoiceprintError;

/// L2-normalizes a vector to unit length in-place.
///
/// Returns the original norm. A zero vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) -> f64 {
    let norm = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let scale = 1.0 / norm;
        for x in v.iter_mut() {
            *x = (*x as f64 * scale) as f32;
        }
    }
    norm
}

/// Cosine similarity of two embeddings: the dot product of their
/// L2-normalized forms.
///
/// Conceptually in `[-1, 1]`; rounding may overshoot by an epsilon. Fails
/// when the lengths differ or either vector has zero (or non-finite) norm,
/// instead of returning NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, VoiceprintError> {
    if a.len() != b.len() {
        return Err(VoiceprintError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    if a.is_empty() {
        return Err(VoiceprintError::Embedding("empty embedding".into()));
    }

    let (mut a, mut b) = (a.to_vec(), b.to_vec());
    let (na, nb) = (l2_normalize(&mut a), l2_normalize(&mut b));
    if !(na > 0.0 && na.is_finite() && nb > 0.0 && nb.is_finite()) {
        return Err(VoiceprintError::Embedding(format!(
            "zero-norm or non-finite embedding (|a| = {na}, |b| = {nb})"
        )));
    }

    let dot: f64 = a.iter().zip(&b).map(|(&x, &y)| x as f64 * y as f64).sum();
    Ok(dot)
}

//! Fixed-width float vector utilities: cosine similarity, L2 distance,
//! normalization, and a little-endian byte round-trip.
//!
//! Vectors are plain `Vec<f32>`; there is no dedicated newtype because every
//! caller (the store, the applier, the embedding provider) just needs slice
//! operations, and a newtype would add friction without enforcing an
//! invariant `&[f32]` doesn't already carry.

/// Sentinel distance returned by [`distance`] when the two vectors have
/// different lengths (there is no meaningful L2 distance between vectors of
/// different dimensionality).
pub const DISTANCE_MISMATCH: f32 = f32::MAX;

/// Cosine similarity between two vectors.
///
/// Returns `0.0` if either vector is empty or the lengths differ, and `0.0`
/// if either vector has zero magnitude (a zero vector has no defined
/// direction to compare).
#[must_use]
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Euclidean (L2) distance between two vectors.
///
/// Returns [`DISTANCE_MISMATCH`] if the lengths differ.
#[must_use]
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return DISTANCE_MISMATCH;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Returns a unit-length copy of `v`.
///
/// Returns `v` unchanged (cloned) when its norm is zero, since there is no
/// direction to normalize toward.
#[must_use]
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Encodes a vector as little-endian IEEE-754 bytes.
#[must_use]
pub fn to_bytes(v: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    bytes
}

/// Decodes little-endian IEEE-754 bytes into a vector.
///
/// Returns an empty vector if `bytes.len()` is not a multiple of 4.
#[must_use]
pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 4 != 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = [chunk[0], chunk[1], chunk[2], chunk[3]];
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_identical_vectors() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_empty_or_mismatched() {
        assert_eq!(similarity(&[], &[1.0]), 0.0);
        assert_eq!(similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let zero = vec![0.0, 0.0];
        let other = vec![1.0, 1.0];
        assert_eq!(similarity(&zero, &other), 0.0);
    }

    #[test]
    fn test_distance_basic() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_mismatch_sentinel() {
        assert_eq!(distance(&[1.0], &[1.0, 2.0]), DISTANCE_MISMATCH);
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = vec![3.0, 4.0];
        let n = normalize(&v);
        let mag = (n[0] * n[0] + n[1] * n[1]).sqrt();
        assert!((mag - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let v = vec![0.0, 0.0, 0.0];
        assert_eq!(normalize(&v), v);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let v = vec![1.5_f32, -2.25, 0.0, 100.125];
        let bytes = to_bytes(&v);
        let back = from_bytes(&bytes);
        assert_eq!(v, back);
    }

    #[test]
    fn test_from_bytes_non_multiple_of_four() {
        let bytes = vec![1, 2, 3];
        assert!(from_bytes(&bytes).is_empty());
    }

    #[test]
    fn test_to_bytes_empty() {
        let v: Vec<f32> = vec![];
        assert!(to_bytes(&v).is_empty());
    }
}

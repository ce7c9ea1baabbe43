//! Deterministic hash-derived pseudo-embeddings.
//!
//! Not a trained representation: each token is hashed into one of `dims`
//! buckets with a ±1 sign, weighted by log term frequency, and the vector is
//! L2-normalized. Two texts sharing tokens get a positive cosine; beyond that
//! the vector carries no meaning. The only guarantee is determinism.

use crate::similarity::tokenize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Build the pseudo-embedding of `text`. Empty text (or `dims == 0`) yields a zero vector.
pub fn pseudo_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    if dims == 0 {
        return vector;
    }

    let mut frequencies: BTreeMap<String, u32> = BTreeMap::new();
    for token in tokenize(text) {
        *frequencies.entry(token).or_insert(0) += 1;
    }

    for (token, tf) in frequencies {
        let digest = Sha256::digest(token.as_bytes());
        let bucket =
            u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % dims;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (tf as f32).ln();
        vector[bucket] += sign * weight;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = pseudo_embedding("hybrid search over markdown files", 64);
        let b = pseudo_embedding("hybrid search over markdown files", 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_length() {
        let v = pseudo_embedding("cache invalidation strategy", 32);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_identical_text_cosine_one() {
        let v = pseudo_embedding("database migration", 128);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_zero_vector() {
        let v = pseudo_embedding("a an the", 16);
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &pseudo_embedding("database", 16)), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}

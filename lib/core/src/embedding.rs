use serde::{Deserialize, Serialize};

/// A face embedding: a fixed-dimension f32 vector together with its
/// precomputed L2 norm. The norm is computed once at construction so that
/// similarity code can reject zero-norm vectors without re-scanning the data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    data: Vec<f32>,
    norm: f32,
}

impl Embedding {
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        let norm = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        Self { data, norm }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data.to_vec())
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.norm
    }

    #[inline]
    #[must_use]
    pub fn is_zero_norm(&self) -> bool {
        self.norm <= f32::EPSILON
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Compute cosine similarity with another embedding.
    /// Mismatched dimensions or a zero-norm operand yield 0.0.
    #[inline]
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }
        if self.is_zero_norm() || other.is_zero_norm() {
            return 0.0;
        }

        let dot: f32 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum();

        dot / (self.norm * other.norm)
    }

    /// Get a unit-normalized copy of the raw vector.
    /// Returns `None` for a zero-norm embedding.
    #[must_use]
    pub fn unit(&self) -> Option<Vec<f32>> {
        if self.is_zero_norm() {
            return None;
        }
        let inv = 1.0 / self.norm;
        Some(self.data.iter().map(|x| x * inv).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-6);

        let c = Embedding::new(vec![1.0, 0.0]);
        let d = Embedding::new(vec![0.0, 1.0]);
        assert!((c.cosine_similarity(&d) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_norm_precomputed() {
        let e = Embedding::new(vec![3.0, 4.0]);
        assert!((e.norm() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm() {
        let z = Embedding::new(vec![0.0, 0.0, 0.0]);
        assert!(z.is_zero_norm());
        assert!(z.unit().is_none());

        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(z.cosine_similarity(&a), 0.0);
    }

    #[test]
    fn test_unit_vector() {
        let e = Embedding::new(vec![3.0, 4.0]);
        let u = e.unit().unwrap();
        let norm: f32 = u.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_is_zero() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }
}

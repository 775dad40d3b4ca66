//! Dense embedding vectors.

use serde::{Deserialize, Serialize};

use crate::error::{PictorError, Result};

/// Tolerance used when checking that an embedding has unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// A dense embedding produced by an [`ImageEmbedder`](super::ImageEmbedder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The vector dimensions as floating point values.
    pub data: Vec<f32>,
}

impl Embedding {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimensionality of this embedding.
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Calculate the L2 norm (magnitude) of this embedding.
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize this embedding to unit length. Zero vectors are left as is.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.data {
                *value /= norm;
            }
        }
    }

    /// Get a normalized copy of this embedding.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Whether the embedding is finite and of unit length.
    pub fn is_unit(&self) -> bool {
        self.data.iter().all(|x| x.is_finite()) && (self.norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
    }

    /// Validate that this embedding has the expected dimension.
    pub fn validate_dimension(&self, expected_dim: usize) -> Result<()> {
        if self.data.len() != expected_dim {
            return Err(PictorError::invalid_argument(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                expected_dim,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Element-wise mean of several embeddings of equal dimension.
    ///
    /// The mean is not renormalised.
    pub fn mean(embeddings: &[Embedding]) -> Result<Embedding> {
        let first = embeddings
            .first()
            .ok_or_else(|| PictorError::input("cannot average zero embeddings"))?;
        let dimension = first.dimension();

        let mut sum = vec![0f32; dimension];
        for embedding in embeddings {
            embedding.validate_dimension(dimension)?;
            for (acc, value) in sum.iter_mut().zip(embedding.data.iter()) {
                *acc += value;
            }
        }

        let count = embeddings.len() as f32;
        Ok(Embedding::new(sum.into_iter().map(|v| v / count).collect()))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

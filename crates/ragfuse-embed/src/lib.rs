//! ragfuse-embed
//!
//! Local embedding providers. The retrieval core treats embedding as an
//! external capability behind `ragfuse_core::traits::Embedder`; this crate ships
//! a deterministic feature-hashing embedder so indexes can be built and tested
//! without a model server.

use std::hash::{Hash, Hasher};
use tracing::info;
use twox_hash::XxHash64;

use ragfuse_core::config::VectorSettings;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::Embedder;

/// Bag-of-words embedding: every lowercased alphanumeric token adds 1.0 to the
/// bucket its xxHash64 selects, then the vector is L2-normalized.
///
/// Texts without tokens map to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    seed: u64,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("embedding dimension must be positive".into()));
        }
        Ok(Self { dim, seed: 0 })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = XxHash64::with_seed(self.seed);
        token.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            v[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        Ok(v)
    }
}

pub fn get_default_embedder(settings: &VectorSettings) -> Result<Box<dyn Embedder>> {
    info!(dim = settings.dim, "using hashing embedder");
    Ok(Box::new(HashingEmbedder::new(settings.dim)?))
}

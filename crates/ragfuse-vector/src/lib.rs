//! ragfuse-vector
//!
//! In-memory embedding index with cosine-similarity search.

pub mod index;
pub mod similarity;

pub use index::{VectorIndex, DEFAULT_MIN_SIMILARITY};
pub use similarity::cosine_similarity;

//! ragfuse-hybrid
//!
//! Hybrid retrieval: fan a query out to several indexes, fuse their rankings
//! with reciprocal rank fusion and optionally let a reranker reorder the
//! result. Also hosts the contextualizer that prepares chunks for indexing.

pub mod context;
pub mod rerank;
pub mod retriever;
pub mod rrf;

pub use context::Contextualizer;
pub use rerank::{apply_ranking, LlmReranker};
pub use retriever::Retriever;
pub use rrf::{reciprocal_rank_fusion, DEFAULT_K_RRF};

//! ragfuse-text
//!
//! Lexical side of hybrid retrieval: a tantivy-analyzer tokenizer, corpus term
//! statistics and an in-memory BM25 index implementing `SearchIndex`.

pub mod bm25;
pub mod stats;
pub mod tokenizer;

pub use bm25::{Bm25Index, Bm25Params, Posting};
pub use stats::TermStats;
pub use tokenizer::Tokenizer;

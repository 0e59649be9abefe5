//! ragfuse-core
//!
//! Shared types, traits, errors and configuration for the ragfuse workspace,
//! plus the chunking strategies and directory ingestion that feed the indexes.
#![deny(unused_imports)]

pub mod chunking;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};

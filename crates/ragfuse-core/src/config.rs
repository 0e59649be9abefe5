use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// All sections, validated.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    #[default]
    Size,
    Structure,
    Sentence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub strategy: ChunkStrategy,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub delimiter: String,
    pub max_sentences_per_chunk: usize,
    pub overlap_sentences: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Size,
            chunk_size: 1000,
            chunk_overlap: 200,
            delimiter: crate::chunking::DEFAULT_SECTION_DELIMITER.to_string(),
            max_sentences_per_chunk: 5,
            overlap_sentences: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Settings {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization, 0.0..=1.0.
    pub b: f32,
    pub stop_words: bool,
}

impl Default for Bm25Settings {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75, stop_words: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub dim: usize,
    /// Similarity a hit must exceed; unset means 0.0.
    pub min_similarity: Option<f32>,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self { dim: 256, min_similarity: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Forward to each index in turn; a failure leaves earlier indexes updated.
    #[default]
    BestEffort,
    /// Stage in every index first and commit only when all stages succeed.
    Atomic,
}

/// What happens to fused candidates a reranker leaves out of its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingCandidates {
    #[default]
    Drop,
    Append,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub k: usize,
    pub k_rrf: f32,
    pub candidate_multiplier: usize,
    pub fan_out: FanOut,
    pub write_mode: WriteMode,
    pub missing_candidates: MissingCandidates,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            k: 1,
            k_rrf: 60.0,
            candidate_multiplier: 5,
            fan_out: FanOut::Sequential,
            write_mode: WriteMode::BestEffort,
            missing_candidates: MissingCandidates::Drop,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub num_start_chunks: usize,
    pub num_prev_chunks: usize,
    pub separator: String,
    /// Documents up to this many characters are passed whole as context.
    pub full_document_max_chars: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { num_start_chunks: 2, num_prev_chunks: 2, separator: "\n".to_string(), full_document_max_chars: 8000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataSettings {
    pub txt_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub bm25: Bm25Settings,
    pub vector: VectorSettings,
    pub retriever: RetrieverSettings,
    pub context: ContextSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        crate::chunking::from_settings(&self.chunking)?;
        if self.bm25.k1.is_nan() || self.bm25.k1 < 0.0 {
            return Err(Error::InvalidConfig(format!("bm25.k1 must be non-negative, got {}", self.bm25.k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::InvalidConfig(format!("bm25.b must be within 0..=1, got {}", self.bm25.b)));
        }
        if self.vector.dim == 0 {
            return Err(Error::InvalidConfig("vector.dim must be positive".into()));
        }
        if self.retriever.k == 0 {
            return Err(Error::InvalidConfig("retriever.k must be positive".into()));
        }
        if !self.retriever.k_rrf.is_finite() || self.retriever.k_rrf < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "retriever.k_rrf must be non-negative, got {}",
                self.retriever.k_rrf
            )));
        }
        if self.retriever.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("retriever.candidate_multiplier must be positive".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

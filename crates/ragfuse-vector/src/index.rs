use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument, warn};

use ragfuse_core::config::VectorSettings;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{Embedder, SearchIndex, StagedWrite};
use ragfuse_core::types::{Document, SearchHit, SourceKind};

use crate::similarity::{cosine_with_norms, magnitude};

#[derive(Default)]
struct VectorState {
    dim: Option<usize>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    documents: Vec<Arc<Document>>,
}

impl VectorState {
    /// Dimensionality the batch would leave the index with, or the first
    /// vector that disagrees with it.
    fn check(&self, vectors: &[&[f32]]) -> Result<Option<usize>> {
        let mut dim = self.dim;
        for v in vectors {
            if v.is_empty() {
                return Err(Error::InvalidInput("embedding must not be empty".into()));
            }
            match dim {
                Some(expected) if expected != v.len() => {
                    return Err(Error::DimensionMismatch { expected, actual: v.len() });
                }
                Some(_) => {}
                None => dim = Some(v.len()),
            }
        }
        Ok(dim)
    }

    fn push_all(&mut self, items: Vec<(Vec<f32>, Document)>) -> Result<()> {
        let dim = self.check(&items.iter().map(|(v, _)| v.as_slice()).collect::<Vec<_>>())?;
        self.dim = dim;
        for (vector, doc) in items {
            self.norms.push(magnitude(&vector));
            self.vectors.push(vector);
            self.documents.push(Arc::new(doc));
        }
        Ok(())
    }
}

/// Default similarity floor: orthogonal, opposite and zero vectors are not hits.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.0;

/// Brute-force cosine-similarity index over embedding vectors.
///
/// The first stored vector fixes the dimensionality; later inserts and
/// queries must match it. Text inserts and text queries need an embedder.
///
/// Searches only return vectors whose similarity is strictly above the floor
/// ([`DEFAULT_MIN_SIMILARITY`] unless configured), so a document with nothing
/// in common with the query never earns a rank.
pub struct VectorIndex {
    name: String,
    embedder: Option<Arc<dyn Embedder>>,
    min_similarity: f32,
    state: RwLock<VectorState>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex {
    /// An index that only accepts precomputed vectors.
    pub fn new() -> Self {
        Self { name: "vector".to_string(), embedder: None, min_similarity: DEFAULT_MIN_SIMILARITY, state: RwLock::new(VectorState::default()) }
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder: Some(embedder), ..Self::new() }
    }

    pub fn from_settings(settings: &VectorSettings, embedder: Arc<dyn Embedder>) -> Self {
        let floor = settings.min_similarity.unwrap_or(DEFAULT_MIN_SIMILARITY);
        Self::with_embedder(embedder).with_min_similarity(floor)
    }

    /// Keep only hits whose similarity is strictly above `floor`. A floor
    /// below -1 returns every stored vector.
    pub fn with_min_similarity(mut self, floor: f32) -> Self {
        self.min_similarity = floor;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn dim(&self) -> Result<Option<usize>> {
        Ok(self.read()?.dim)
    }

    pub fn add_vector(&self, embedding: Vec<f32>, doc: Document) -> Result<()> {
        self.add_vectors(vec![(embedding, doc)])
    }

    /// Stores every pair or none: the whole batch is checked before insertion.
    #[instrument(skip_all, fields(index = %self.name, docs = items.len()))]
    pub fn add_vectors(&self, items: Vec<(Vec<f32>, Document)>) -> Result<()> {
        let mut state = self.write()?;
        state.push_all(items)?;
        debug!(total = state.documents.len(), dim = ?state.dim, "indexed");
        Ok(())
    }

    #[instrument(skip_all, fields(index = %self.name, k = k))]
    pub fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be a positive integer".into()));
        }
        let state = self.read()?;
        let Some(dim) = state.dim else { return Ok(vec![]) };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        let query_norm = magnitude(query);
        let mut ranked: Vec<(usize, f32)> = state
            .vectors
            .iter()
            .zip(&state.norms)
            .map(|(v, &n)| cosine_with_norms(query, query_norm, v, n))
            .enumerate()
            .filter(|&(_, sim)| sim > self.min_similarity)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        debug!(hits = ranked.len(), "searched");

        Ok(ranked
            .into_iter()
            .map(|(i, score)| SearchHit { document: Arc::clone(&state.documents[i]), score, source: SourceKind::Vector })
            .collect())
    }

    fn embedder(&self) -> Result<&Arc<dyn Embedder>> {
        self.embedder
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig(format!("index '{}' has no embedding function", self.name)))
    }

    fn embed_documents(&self, docs: &[Document]) -> Result<Vec<(Vec<f32>, Document)>> {
        let embedder = self.embedder()?;
        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != docs.len() {
            return Err(Error::external(
                "embedder",
                format!("returned {} vectors for {} texts", vectors.len(), docs.len()),
            ));
        }
        Ok(vectors.into_iter().zip(docs.iter().cloned()).collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, VectorState>> {
        self.state.read().map_err(|_| Error::index(&self.name, "state lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, VectorState>> {
        self.state.write().map_err(|_| Error::index(&self.name, "state lock poisoned"))
    }
}

impl SearchIndex for VectorIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_document(&self, doc: Document) -> Result<()> {
        self.add_documents(std::slice::from_ref(&doc))
    }

    fn add_documents(&self, docs: &[Document]) -> Result<()> {
        let items = self.embed_documents(docs)?;
        self.add_vectors(items)
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = self.embedder()?.embed(query)?;
        self.search_vec(&query_vec, k)
    }

    /// Reports 0 when the state lock is poisoned; other calls surface that as an error.
    fn len(&self) -> usize {
        match self.read() {
            Ok(state) => state.documents.len(),
            Err(e) => {
                warn!(error = %e, "length unavailable");
                0
            }
        }
    }

    fn stage(&self, docs: &[Document]) -> Result<Box<dyn StagedWrite + '_>> {
        let items = self.embed_documents(docs)?;
        self.read()?.check(&items.iter().map(|(v, _)| v.as_slice()).collect::<Vec<_>>())?;
        Ok(Box::new(StagedVectors { index: self, items }))
    }
}

struct StagedVectors<'a> {
    index: &'a VectorIndex,
    items: Vec<(Vec<f32>, Document)>,
}

impl StagedWrite for StagedVectors<'_> {
    fn len(&self) -> usize {
        self.items.len()
    }

    // Re-checked under the write lock: another writer may have fixed the
    // dimensionality since staging.
    fn commit(self: Box<Self>) -> Result<()> {
        let Self { index, items } = *self;
        index.write()?.push_all(items)
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, instrument};

use ragfuse_core::config::{FanOut, MissingCandidates, RetrieverSettings, WriteMode};
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{Reranker, SearchIndex, StagedWrite};
use ragfuse_core::types::{DocId, Document, FusedHit, SearchHit, SourceKind};

use crate::rerank::apply_ranking;
use crate::rrf::reciprocal_rank_fusion;

static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(0);

/// Next identifier for a document inserted without one. Unique per process.
pub fn next_doc_id() -> DocId {
    format!("doc-{}", NEXT_DOC_ID.fetch_add(1, Ordering::Relaxed))
}

/// Fans writes and queries out to an ordered set of indexes and merges their
/// rankings with reciprocal rank fusion.
///
/// Index errors are never swallowed: the first failure (in registration
/// order) is returned and fusion does not run.
pub struct Retriever {
    indexes: Vec<Arc<dyn SearchIndex>>,
    reranker: Option<Arc<dyn Reranker>>,
    settings: RetrieverSettings,
}

impl Retriever {
    pub fn new(indexes: Vec<Arc<dyn SearchIndex>>) -> Result<Self> {
        Self::from_settings(indexes, RetrieverSettings::default())
    }

    pub fn from_settings(indexes: Vec<Arc<dyn SearchIndex>>, settings: RetrieverSettings) -> Result<Self> {
        if indexes.is_empty() {
            return Err(Error::InvalidConfig("at least one index must be provided".into()));
        }
        check_k(settings.k)?;
        check_k_rrf(settings.k_rrf)?;
        if settings.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("candidate_multiplier must be positive".into()));
        }
        info!(
            indexes = ?indexes.iter().map(|i| i.name()).collect::<Vec<_>>(),
            fan_out = ?settings.fan_out,
            write_mode = ?settings.write_mode,
            "retriever ready"
        );
        Ok(Self { indexes, reranker: None, settings })
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_k_rrf(mut self, k_rrf: f32) -> Result<Self> {
        check_k_rrf(k_rrf)?;
        self.settings.k_rrf = k_rrf;
        Ok(self)
    }

    /// Result cap used by [`Self::retrieve_default`].
    pub fn with_k(mut self, k: usize) -> Result<Self> {
        check_k(k)?;
        self.settings.k = k;
        Ok(self)
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.settings.fan_out = fan_out;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.settings.write_mode = write_mode;
        self
    }

    pub fn with_missing_candidates(mut self, missing: MissingCandidates) -> Self {
        self.settings.missing_candidates = missing;
        self
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    pub fn indexes(&self) -> &[Arc<dyn SearchIndex>] {
        &self.indexes
    }

    /// Inserts `docs` into every index and returns their ids, assigning fresh
    /// ones where missing.
    ///
    /// With [`WriteMode::BestEffort`] a failing index stops the write and the
    /// indexes before it keep the batch. With [`WriteMode::Atomic`] every
    /// index stages the batch first and nothing becomes visible unless all
    /// stages succeed.
    #[instrument(skip_all, fields(docs = docs.len(), mode = ?self.settings.write_mode))]
    pub fn insert(&self, mut docs: Vec<Document>) -> Result<Vec<DocId>> {
        for doc in docs.iter_mut().filter(|d| !d.has_id()) {
            doc.id = next_doc_id();
        }
        let ids = docs.iter().map(|d| d.id.clone()).collect();

        match self.settings.write_mode {
            WriteMode::BestEffort => {
                self.fan_out(|index| index.add_documents(&docs))?;
            }
            WriteMode::Atomic => {
                let staged: Vec<Box<dyn StagedWrite + '_>> = self.fan_out(|index| index.stage(&docs))?;
                for write in staged {
                    write.commit()?;
                }
            }
        }
        debug!("inserted");
        Ok(ids)
    }

    /// Fused top-`k` for `query`.
    ///
    /// Each index is asked for `k * candidate_multiplier` hits. With a
    /// reranker, that many fused candidates are reordered before the cut to `k`.
    #[instrument(skip_all, fields(k = k))]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<FusedHit>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be a positive integer".into()));
        }
        let depth = k.saturating_mul(self.settings.candidate_multiplier);
        let lists = self.fan_out(|index| index.search(query, depth))?;
        let mut fused = reciprocal_rank_fusion(&lists, self.settings.k_rrf);

        if let Some(reranker) = &self.reranker {
            fused.truncate(depth);
            let documents: Vec<Arc<Document>> = fused.iter().map(|h| h.document.clone()).collect();
            let ranked = reranker.rerank(&documents, query, k)?;
            fused = apply_ranking(fused, &ranked, self.settings.missing_candidates);
        }
        fused.truncate(k);
        debug!(hits = fused.len(), "retrieved");
        Ok(fused)
    }

    /// [`Self::retrieve`] with the configured `k`.
    pub fn retrieve_default(&self, query: &str) -> Result<Vec<FusedHit>> {
        self.retrieve(query, self.settings.k)
    }

    /// Runs `op` against every index, in parallel when configured, and returns
    /// the results in registration order. Every worker is joined before the
    /// first error (in registration order) is returned.
    fn fan_out<'a, T, F>(&'a self, op: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&'a dyn SearchIndex) -> Result<T> + Sync,
    {
        match self.settings.fan_out {
            FanOut::Sequential => self.indexes.iter().map(|index| op(index.as_ref())).collect(),
            FanOut::Parallel => thread::scope(|s| {
                let op = &op;
                let handles: Vec<_> = self
                    .indexes
                    .iter()
                    .map(|index| s.spawn(move || op(index.as_ref())))
                    .collect();
                let results: Vec<Result<T>> = handles
                    .into_iter()
                    .zip(&self.indexes)
                    .map(|(handle, index)| match handle.join() {
                        Ok(result) => result,
                        Err(_) => Err(Error::index(index.name(), "worker panicked")),
                    })
                    .collect();
                results.into_iter().collect()
            }),
        }
    }
}

/// A retriever can itself be registered as an index of another retriever.
impl SearchIndex for Retriever {
    fn name(&self) -> &str {
        "retriever"
    }

    fn add_document(&self, doc: Document) -> Result<()> {
        self.insert(vec![doc]).map(|_| ())
    }

    fn add_documents(&self, docs: &[Document]) -> Result<()> {
        self.insert(docs.to_vec()).map(|_| ())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .retrieve(query, k)?
            .into_iter()
            .map(|h| SearchHit { document: h.document, score: h.score, source: SourceKind::Other })
            .collect())
    }

    fn len(&self) -> usize {
        self.indexes.iter().map(|i| i.len()).max().unwrap_or(0)
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidConfig("k must be positive".into()));
    }
    Ok(())
}

// 1/(k_rrf + rank) must stay finite and positive for every rank >= 1.
fn check_k_rrf(k_rrf: f32) -> Result<()> {
    if !k_rrf.is_finite() || k_rrf < 0.0 {
        return Err(Error::InvalidConfig(format!("k_rrf must be a non-negative number, got {k_rrf}")));
    }
    Ok(())
}

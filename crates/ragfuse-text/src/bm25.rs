//! In-memory BM25 lexical index.
//!
//! Scores a document against a query as
//!
//! ```text
//! Σ_t idf(t) · tf(t,d)·(k1+1) / (tf(t,d) + k1·(1 − b + b·|d|/avgdl))
//! ```
//!
//! summed over the query terms (repeated query terms count again). Only
//! documents sharing at least one term with the query are scored; ties keep
//! insertion order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument, warn};

use ragfuse_core::config::Bm25Settings;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{SearchIndex, StagedWrite};
use ragfuse_core::types::{Document, SearchHit, SourceKind};

use crate::stats::{term_frequencies, TermStats};
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Params {
    pub fn new(k1: f32, b: f32) -> Result<Self> {
        if k1.is_nan() || k1 < 0.0 {
            return Err(Error::InvalidConfig(format!("k1 must be non-negative, got {k1}")));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(Error::InvalidConfig(format!("b must be within 0..=1, got {b}")));
        }
        Ok(Self { k1, b })
    }

    /// Contribution of one query term to one document's score.
    pub fn term_score(&self, idf: f32, tf: u32, doc_len: usize, avg_doc_len: f32) -> f32 {
        if tf == 0 || idf == 0.0 {
            return 0.0;
        }
        let tf = tf as f32;
        let len_ratio = if avg_doc_len > 0.0 { doc_len as f32 / avg_doc_len } else { 1.0 };
        idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * len_ratio))
    }
}

/// One entry of a term's posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Insertion position of the document in this index.
    pub doc: usize,
    pub tf: u32,
}

#[derive(Default)]
struct Bm25State {
    documents: Vec<Arc<Document>>,
    doc_lens: Vec<usize>,
    postings: HashMap<String, Vec<Posting>>,
    stats: TermStats,
}

struct PreparedDoc {
    doc: Arc<Document>,
    term_freqs: HashMap<String, u32>,
    len: usize,
}

impl Bm25State {
    fn apply(&mut self, prepared: Vec<PreparedDoc>) {
        for p in prepared {
            let position = self.documents.len();
            for (term, &tf) in &p.term_freqs {
                self.postings.entry(term.clone()).or_default().push(Posting { doc: position, tf });
            }
            self.stats.add_document(&p.term_freqs, p.len);
            self.doc_lens.push(p.len);
            self.documents.push(p.doc);
        }
    }
}

pub struct Bm25Index {
    name: String,
    params: Bm25Params,
    tokenizer: Tokenizer,
    state: RwLock<Bm25State>,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::with_params(Bm25Params::default())
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self { name: "bm25".to_string(), params, tokenizer: Tokenizer::new(), state: RwLock::new(Bm25State::default()) }
    }

    pub fn from_settings(settings: &Bm25Settings) -> Result<Self> {
        let params = Bm25Params::new(settings.k1, settings.b)?;
        let tokenizer = if settings.stop_words { Tokenizer::with_stop_words() } else { Tokenizer::new() };
        Ok(Self::with_params(params).with_tokenizer(tokenizer))
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn doc_freq(&self, term: &str) -> Result<usize> {
        Ok(self.read()?.stats.doc_freq(term))
    }

    pub fn idf(&self, term: &str) -> Result<f32> {
        Ok(self.read()?.stats.idf(term))
    }

    pub fn postings(&self, term: &str) -> Result<Vec<Posting>> {
        Ok(self.read()?.postings.get(term).cloned().unwrap_or_default())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Bm25State>> {
        self.state.read().map_err(|_| Error::index(&self.name, "state lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Bm25State>> {
        self.state.write().map_err(|_| Error::index(&self.name, "state lock poisoned"))
    }

    // Tokenizing happens outside the lock so readers are only blocked while
    // postings are appended.
    fn prepare(&self, docs: &[Document]) -> Vec<PreparedDoc> {
        docs.iter()
            .map(|doc| {
                let terms = self.tokenizer.tokenize(&doc.content);
                PreparedDoc { doc: Arc::new(doc.clone()), term_freqs: term_frequencies(&terms), len: terms.len() }
            })
            .collect()
    }
}

impl SearchIndex for Bm25Index {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_document(&self, doc: Document) -> Result<()> {
        self.add_documents(std::slice::from_ref(&doc))
    }

    #[instrument(skip_all, fields(index = %self.name, docs = docs.len()))]
    fn add_documents(&self, docs: &[Document]) -> Result<()> {
        let prepared = self.prepare(docs);
        let mut state = self.write()?;
        state.apply(prepared);
        debug!(total = state.documents.len(), terms = state.stats.vocabulary_len(), "indexed");
        Ok(())
    }

    #[instrument(skip_all, fields(index = %self.name, k = k))]
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be a positive integer".into()));
        }
        let query_terms = self.tokenizer.tokenize(query);
        if query_terms.is_empty() {
            return Ok(vec![]);
        }
        let state = self.read()?;
        let avg_doc_len = state.stats.avg_doc_len();

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &query_terms {
            let Some(postings) = state.postings.get(term) else { continue };
            let idf = state.stats.idf(term);
            for p in postings {
                let s = self.params.term_score(idf, p.tf, state.doc_lens[p.doc], avg_doc_len);
                *scores.entry(p.doc).or_insert(0.0) += s;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().filter(|&(_, s)| s > 0.0).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        debug!(terms = query_terms.len(), hits = ranked.len(), "searched");

        Ok(ranked
            .into_iter()
            .map(|(doc, score)| SearchHit { document: Arc::clone(&state.documents[doc]), score, source: SourceKind::Text })
            .collect())
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
        Ok(Box::new(StagedBm25 { index: self, prepared: self.prepare(docs) }))
    }
}

struct StagedBm25<'a> {
    index: &'a Bm25Index,
    prepared: Vec<PreparedDoc>,
}

impl StagedWrite for StagedBm25<'_> {
    fn len(&self) -> usize {
        self.prepared.len()
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let Self { index, prepared } = *self;
        index.write()?.apply(prepared);
        Ok(())
    }
}

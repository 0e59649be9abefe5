use std::ops::Range;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Chunk, DocId, Document, SearchHit};

/// Turns text into fixed-dimension vectors. Implementations are expected to be
/// pure functions of their input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Completes a prompt and returns raw text. Parsing structured output is the
/// caller's job.
pub trait TextGenerator: Send + Sync {
    fn complete(&self, prompt: &str, stop_sequences: &[&str]) -> Result<String>;
}

/// A batch that an index has fully prepared but not yet made visible.
///
/// All fallible work (tokenizing, embedding, dimension checks) happens when the
/// batch is staged. Dropping a staged write discards it.
pub trait StagedWrite: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn commit(self: Box<Self>) -> Result<()>;
}

/// The capability set every index exposes to the retriever.
///
/// Writes go through `&self`; implementations guard their state so that a
/// concurrent search never observes a half-applied insert.
pub trait SearchIndex: Send + Sync {
    /// Short label used in logs and error messages.
    fn name(&self) -> &str;

    fn add_document(&self, doc: Document) -> Result<()>;

    fn add_documents(&self, docs: &[Document]) -> Result<()> {
        for doc in docs {
            self.add_document(doc.clone())?;
        }
        Ok(())
    }

    /// Up to `k` hits ordered by descending score, ties in insertion order.
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prepares `docs` for an all-or-nothing multi-index write.
    fn stage(&self, docs: &[Document]) -> Result<Box<dyn StagedWrite + '_>> {
        let _ = docs;
        Err(Error::index(self.name(), "staged writes are not supported"))
    }
}

/// Splits a text into an ordered sequence of contiguous spans.
pub trait Chunker: Send + Sync {
    /// Byte ranges into `text`, in document order.
    fn spans(&self, text: &str) -> Vec<Range<usize>>;

    fn split(&self, text: &str) -> Vec<String> {
        self.spans(text).into_iter().map(|r| text[r].to_string()).collect()
    }

    fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let spans = self.spans(text);
        let total_chunks = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(index, r)| Chunk {
                doc_id: doc_id.to_string(),
                index,
                total_chunks,
                start: r.start,
                text: text[r].to_string(),
            })
            .collect()
    }
}

/// Reorders fused candidates. Returns document ids, most relevant first; the
/// result may be shorter than the candidate list.
pub trait Reranker: Send + Sync {
    fn rerank(&self, candidates: &[Arc<Document>], query: &str, k: usize) -> Result<Vec<DocId>>;
}

impl<F> Reranker for F
where
    F: Fn(&[Arc<Document>], &str, usize) -> Result<Vec<DocId>> + Send + Sync,
{
    fn rerank(&self, candidates: &[Arc<Document>], query: &str, k: usize) -> Result<Vec<DocId>> {
        self(candidates, query, k)
    }
}

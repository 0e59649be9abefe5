//! Domain types shared by the chunkers, the indexes and the retriever.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub type DocId = String;
pub type Meta = HashMap<String, String>;

/// A unit of indexable text.
///
/// - `id`: identity used by fusion to recognise the same document across
///   indexes; the retriever fills it in when left empty
/// - `content`: the text every index tokenizes or embeds
/// - `metadata`: free-form named fields carried through untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: DocId,
    pub content: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self { id: String::new(), content: content.into(), metadata: Meta::new() }
    }

    pub fn with_id(id: impl Into<DocId>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: Meta::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

/// A contiguous span of a source document.
///
/// `start` is the byte offset of `text` inside the source; `index` is the
/// position among the document's chunks and `total_chunks` their count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: DocId,
    pub index: usize,
    pub total_chunks: usize,
    pub start: usize,
    pub text: String,
}

impl Chunk {
    pub fn id(&self) -> DocId {
        format!("{}:{}", self.doc_id, self.index)
    }

    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Index-ready document whose content is the raw chunk text.
    pub fn into_document(self) -> Document {
        let id = self.id();
        Document::with_id(id, self.text)
            .with_meta("doc_id", self.doc_id)
            .with_meta("chunk_index", self.index.to_string())
            .with_meta("start", self.start.to_string())
    }
}

/// A chunk with a generated situating snippet in front of it.
///
/// Downstream indexes only ever see `text`; the split between `context` and the
/// chunk is not recoverable from an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualizedChunk {
    pub chunk: Chunk,
    pub context: String,
    pub text: String,
}

impl ContextualizedChunk {
    pub fn into_document(self) -> Document {
        let mut doc = self.chunk.into_document();
        doc.content = self.text;
        doc
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
    Other,
}

/// One entry of a single index's ranking. Higher `score` is always better.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: Arc<Document>,
    pub score: f32,
    pub source: SourceKind,
}

impl SearchHit {
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// One entry of the retriever's fused ranking.
#[derive(Debug, Clone, Serialize)]
pub struct FusedHit {
    pub document: Arc<Document>,
    pub score: f32,
}

impl FusedHit {
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

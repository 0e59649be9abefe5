//! Chunking strategies.
//!
//! Three interchangeable policies behind the [`Chunker`] trait:
//!
//! - [`SizeChunker`]: fixed character windows with a character overlap
//! - [`StructureChunker`]: one chunk per section, sections start at a delimiter
//! - [`SentenceChunker`]: windows of whole sentences with a sentence overlap
//!
//! Every strategy returns contiguous byte ranges into the source text so chunk
//! offsets stay exact. Sizes are counted in characters, never bytes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use crate::config::{ChunkStrategy, ChunkingSettings};
use crate::error::{Error, Result};
use crate::traits::Chunker;

/// Markdown second-level heading, the default section boundary.
pub const DEFAULT_SECTION_DELIMITER: &str = r"\n## ";

// `. ! ?` runs followed by whitespace or the end of the text.
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("Invalid sentence regex pattern"));

/// Build the chunker selected in the settings.
pub fn from_settings(settings: &ChunkingSettings) -> Result<Box<dyn Chunker>> {
    let chunker: Box<dyn Chunker> = match settings.strategy {
        ChunkStrategy::Size => Box::new(SizeChunker::new(settings.chunk_size, settings.chunk_overlap)?),
        ChunkStrategy::Structure => Box::new(StructureChunker::new(&settings.delimiter)?),
        ChunkStrategy::Sentence => Box::new(SentenceChunker::new(
            settings.max_sentences_per_chunk,
            settings.overlap_sentences,
        )?),
    };
    Ok(chunker)
}

/// Fixed-length windows of `chunk_size` characters.
///
/// Consecutive windows share exactly `chunk_overlap` characters; the last
/// window may be shorter. Windows cover the whole text.
#[derive(Debug, Clone)]
pub struct SizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SizeChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for SizeChunker {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl Chunker for SizeChunker {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        // bounds[i] is the byte offset of character i; the last entry is text.len()
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let n_chars = bounds.len() - 1;
        let mut spans = Vec::new();
        if n_chars == 0 {
            return spans;
        }
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(n_chars);
            spans.push(bounds[start]..bounds[end]);
            if end == n_chars {
                break;
            }
            start = end - self.chunk_overlap;
        }
        spans
    }
}

/// One chunk per structural section.
///
/// A section starts at each match of the delimiter pattern and runs until the
/// next match; text before the first match is its own section. Surrounding
/// whitespace is trimmed and empty sections are skipped, so a text without
/// delimiters yields a single chunk.
#[derive(Debug, Clone)]
pub struct StructureChunker {
    delimiter: Regex,
}

impl StructureChunker {
    pub fn new(pattern: &str) -> Result<Self> {
        let delimiter = Regex::new(pattern)
            .map_err(|e| Error::InvalidConfig(format!("invalid section delimiter '{pattern}': {e}")))?;
        Ok(Self { delimiter })
    }

    pub fn markdown() -> Self {
        Self { delimiter: Regex::new(DEFAULT_SECTION_DELIMITER).expect("Invalid section regex pattern") }
    }
}

impl Default for StructureChunker {
    fn default() -> Self {
        Self::markdown()
    }
}

impl Chunker for StructureChunker {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut starts: Vec<usize> = vec![0];
        starts.extend(self.delimiter.find_iter(text).map(|m| m.start()).filter(|&s| s > 0));
        starts.push(text.len());
        starts
            .windows(2)
            .filter_map(|w| trim_span(text, w[0]..w[1]))
            .collect()
    }
}

/// Windows of `max_sentences_per_chunk` sentences, advancing by
/// `max_sentences_per_chunk - overlap_sentences` sentences per step.
///
/// Sentence boundaries are a heuristic: a run of `. ! ?` followed by
/// whitespace or the end of the text. Abbreviations over-split.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    max_sentences_per_chunk: usize,
    overlap_sentences: usize,
}

impl SentenceChunker {
    pub fn new(max_sentences_per_chunk: usize, overlap_sentences: usize) -> Result<Self> {
        if max_sentences_per_chunk <= overlap_sentences {
            return Err(Error::InvalidConfig(format!(
                "sentence step must be positive: max_sentences_per_chunk ({max_sentences_per_chunk}) \
                 must exceed overlap_sentences ({overlap_sentences})"
            )));
        }
        Ok(Self { max_sentences_per_chunk, overlap_sentences })
    }

    fn step(&self) -> usize {
        self.max_sentences_per_chunk - self.overlap_sentences
    }
}

/// Byte ranges of the individual sentences of `text`, trimmed.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        let punct_end = m.start() + m.as_str().trim_end().len();
        if let Some(span) = trim_span(text, cursor..punct_end) {
            spans.push(span);
        }
        cursor = m.end();
    }
    if let Some(span) = trim_span(text, cursor..text.len()) {
        spans.push(span);
    }
    spans
}

impl Chunker for SentenceChunker {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let sentences = sentence_spans(text);
        let n = sentences.len();
        let mut spans = Vec::new();
        let mut start = 0;
        while start < n {
            let end = (start + self.max_sentences_per_chunk).min(n);
            spans.push(sentences[start].start..sentences[end - 1].end);
            if end == n {
                break;
            }
            start += self.step();
        }
        spans
    }
}

fn trim_span(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return None;
    }
    Some(span.start + leading..span.end - trailing)
}

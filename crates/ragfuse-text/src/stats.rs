//! Corpus-wide term statistics.

use std::collections::HashMap;

/// Term frequencies of one tokenized text.
pub fn term_frequencies(terms: &[String]) -> HashMap<String, u32> {
    let mut tf = HashMap::new();
    for term in terms {
        *tf.entry(term.clone()).or_insert(0) += 1;
    }
    tf
}

/// Document count, total length and per-term document frequency.
#[derive(Debug, Clone, Default)]
pub struct TermStats {
    doc_count: usize,
    total_len: usize,
    doc_freq: HashMap<String, usize>,
}

impl TermStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one more document with the given term frequencies and length.
    pub fn add_document(&mut self, term_freqs: &HashMap<String, u32>, len: usize) {
        self.doc_count += 1;
        self.total_len += len;
        for (term, &tf) in term_freqs {
            if tf > 0 {
                *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.doc_freq.len()
    }

    pub fn avg_doc_len(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_len as f32 / self.doc_count as f32
    }

    /// `ln((N - df + 0.5) / (df + 0.5) + 1)`, never negative. Terms absent
    /// from the corpus weigh 0.
    pub fn idf(&self, term: &str) -> f32 {
        let df = self.doc_freq(term);
        if df == 0 {
            return 0.0;
        }
        let n = self.doc_count as f32;
        let df = df as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

use tracing::{debug, instrument};

use ragfuse_core::config::ContextSettings;
use ragfuse_core::error::Result;
use ragfuse_core::traits::TextGenerator;
use ragfuse_core::types::{Chunk, ContextualizedChunk};

/// Prefixes chunks with a generated snippet that situates them in their
/// source document.
pub struct Contextualizer<G> {
    generator: G,
    settings: ContextSettings,
}

impl<G: TextGenerator> Contextualizer<G> {
    pub fn new(generator: G) -> Self {
        Self::with_settings(generator, ContextSettings::default())
    }

    pub fn with_settings(generator: G, settings: ContextSettings) -> Self {
        Self { generator, settings }
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn prompt(chunk: &str, context_source: &str) -> String {
        format!(
            "Write a short and succinct snippet of text to situate this chunk within the overall source \
             document for the purposes of improving search retrieval of the chunk.\n\n\
             Here is the original source document:\n<document>\n{context_source}\n</document>\n\n\
             Here is the chunk we want to situate within the whole document:\n<chunk>\n{chunk}\n</chunk>\n\n\
             Answer only with the succinct context and nothing else."
        )
    }

    /// `snippet + separator + chunk`, the snippet generated from `context_source`.
    pub fn add_context(&self, chunk: &str, context_source: &str) -> Result<String> {
        let snippet = self.snippet(chunk, context_source)?;
        Ok(self.join(&snippet, chunk))
    }

    fn snippet(&self, chunk: &str, context_source: &str) -> Result<String> {
        let completion = self.generator.complete(&Self::prompt(chunk, context_source), &[])?;
        Ok(completion.trim().to_string())
    }

    fn join(&self, snippet: &str, chunk: &str) -> String {
        format!("{snippet}{}{chunk}", self.settings.separator)
    }

    /// Bounded context for `chunks[i]`: the first `num_start_chunks` chunks of
    /// the document followed by the `num_prev_chunks` chunks right before `i`.
    ///
    /// The two windows never repeat a chunk; chunks between them are skipped.
    pub fn context_window(&self, chunks: &[Chunk], i: usize) -> String {
        let i = i.min(chunks.len());
        let start_end = self.settings.num_start_chunks.min(chunks.len());
        let prev_start = i.saturating_sub(self.settings.num_prev_chunks).max(start_end);

        chunks[..start_end]
            .iter()
            .chain(chunks.get(prev_start..i).unwrap_or_default())
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.settings.separator)
    }

    /// Contextualizes every chunk of one document, in order.
    ///
    /// Documents of at most `full_document_max_chars` characters are given
    /// whole to the generator; longer ones use [`Self::context_window`].
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub fn contextualize(&self, document_text: &str, chunks: &[Chunk]) -> Result<Vec<ContextualizedChunk>> {
        let whole = document_text.chars().count() <= self.settings.full_document_max_chars;
        debug!(whole, "contextualizing");

        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let context = if whole {
                    self.snippet(&chunk.text, document_text)?
                } else {
                    self.snippet(&chunk.text, &self.context_window(chunks, i))?
                };
                let text = self.join(&context, &chunk.text);
                Ok(ContextualizedChunk { chunk: chunk.clone(), context, text })
            })
            .collect()
    }
}

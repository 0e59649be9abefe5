use std::sync::{Arc, Mutex};

use ragfuse_core::chunking::SizeChunker;
use ragfuse_core::config::ContextSettings;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{Chunker, Reranker, TextGenerator};
use ragfuse_core::types::{Chunk, Document};
use ragfuse_hybrid::{Contextualizer, LlmReranker};

/// Replies with a fixed completion and records every call.
#[derive(Default)]
struct ScriptedGenerator {
    reply: String,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedGenerator {
    fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), ..Self::default() }
    }

    fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl TextGenerator for &ScriptedGenerator {
    fn complete(&self, prompt: &str, stop_sequences: &[&str]) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), stop_sequences.iter().map(|s| (*s).to_string()).collect()));
        Ok(self.reply.clone())
    }
}

struct Unavailable;

impl TextGenerator for Unavailable {
    fn complete(&self, _prompt: &str, _stop_sequences: &[&str]) -> Result<String> {
        Err(Error::external("generator", "connection refused"))
    }
}

fn numbered_chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk { doc_id: "doc".into(), index: i, total_chunks: n, start: i * 3, text: format!("c{i}") })
        .collect()
}

#[test]
fn add_context_prefixes_the_snippet() {
    let generator = ScriptedGenerator::replying("  From the onboarding guide.\n");
    let contextualizer = Contextualizer::new(&generator);
    let out = contextualizer.add_context("Press the red button.", "whole guide").unwrap();
    assert_eq!(out, "From the onboarding guide.\nPress the red button.");

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("<document>\nwhole guide\n</document>"));
    assert!(prompt.contains("<chunk>\nPress the red button.\n</chunk>"));
}

#[test]
fn window_joins_start_and_preceding_chunks_without_repeats() {
    let generator = ScriptedGenerator::default();
    let contextualizer = Contextualizer::new(&generator);
    let chunks = numbered_chunks(8);

    assert_eq!(contextualizer.context_window(&chunks, 0), "c0\nc1");
    assert_eq!(contextualizer.context_window(&chunks, 3), "c0\nc1\nc2");
    assert_eq!(contextualizer.context_window(&chunks, 6), "c0\nc1\nc4\nc5");
    assert_eq!(contextualizer.context_window(&chunks[..1], 0), "c0");
}

#[test]
fn window_sizes_follow_settings() {
    let generator = ScriptedGenerator::default();
    let settings = ContextSettings { num_start_chunks: 1, num_prev_chunks: 3, separator: " | ".into(), ..ContextSettings::default() };
    let contextualizer = Contextualizer::with_settings(&generator, settings);
    assert_eq!(contextualizer.context_window(&numbered_chunks(10), 9), "c0 | c6 | c7 | c8");
}

#[test]
fn small_documents_are_given_whole() {
    let generator = ScriptedGenerator::replying("ctx");
    let contextualizer = Contextualizer::new(&generator);
    let text = "First part. Second part. Third part.";
    let chunks = SizeChunker::new(12, 2).unwrap().chunk("doc", text);

    let out = contextualizer.contextualize(text, &chunks).unwrap();
    assert_eq!(out.len(), chunks.len());
    for (c, chunk) in out.iter().zip(&chunks) {
        assert_eq!(c.context, "ctx");
        assert_eq!(c.text, format!("ctx\n{}", chunk.text));
        assert_eq!(&c.chunk, chunk);
    }
    assert!(generator.prompts().iter().all(|p| p.contains(text)));
}

#[test]
fn large_documents_use_the_bounded_window() {
    let generator = ScriptedGenerator::replying("ctx");
    let settings = ContextSettings { full_document_max_chars: 4, ..ContextSettings::default() };
    let contextualizer = Contextualizer::with_settings(&generator, settings);
    let chunks = numbered_chunks(6);

    contextualizer.contextualize("c0c1c2c3c4c5", &chunks).unwrap();
    let prompts = generator.prompts();
    assert!(prompts[5].contains("<document>\nc0\nc1\nc3\nc4\n</document>"));
    assert!(!prompts[5].contains("c0c1c2"));
}

#[test]
fn contextualized_chunks_index_as_one_text() {
    let generator = ScriptedGenerator::replying("About cats.");
    let contextualizer = Contextualizer::new(&generator);
    let chunks = numbered_chunks(1);
    let doc = contextualizer.contextualize("c0", &chunks).unwrap().remove(0).into_document();
    assert_eq!(doc.id, "doc:0");
    assert_eq!(doc.content, "About cats.\nc0");
}

#[test]
fn generator_failures_propagate() {
    let contextualizer = Contextualizer::new(Unavailable);
    let err = contextualizer.contextualize("c0", &numbered_chunks(1)).unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn llm_reranker_prompts_with_ids_and_parses_the_answer() {
    let generator = ScriptedGenerator::replying("\n{\"document_ids\": [\"b\", \"a\"]}\n");
    let reranker = LlmReranker::new(&generator);
    let candidates = vec![Arc::new(Document::with_id("a", "apples")), Arc::new(Document::with_id("b", "bananas"))];

    let ids = reranker.rerank(&candidates, "yellow fruit", 2).unwrap();
    assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);

    let calls = generator.calls.lock().unwrap();
    let (prompt, stops) = &calls[0];
    assert!(prompt.contains("<document_id>b</document_id>"));
    assert!(prompt.contains("<document_content>apples</document_content>"));
    assert!(prompt.contains("<question>\nyellow fruit\n</question>"));
    assert!(prompt.trim_end().ends_with("```json"));
    assert_eq!(stops, &vec!["```".to_string()]);
}

#[test]
fn llm_reranker_rejects_malformed_output() {
    let generator = ScriptedGenerator::replying("{\"ids\": [\"a\"]}");
    let reranker = LlmReranker::new(&generator);
    let err = reranker.rerank(&[Arc::new(Document::with_id("a", "x"))], "q", 1).unwrap_err();
    assert!(matches!(err, Error::ExternalCall { .. }));
}

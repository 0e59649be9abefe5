use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use ragfuse_core::config::MissingCandidates;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{Reranker, TextGenerator};
use ragfuse_core::types::{DocId, Document, FusedHit};

const JSON_FENCE_OPEN: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Deserialize)]
struct RerankResponse {
    document_ids: Vec<DocId>,
}

/// Asks a text generator to pick and order the most relevant candidates.
///
/// The prompt ends with an opened ```json fence and generation stops at the
/// closing fence, so the completion is expected to be a bare
/// `{"document_ids": [...]}` object.
pub struct LlmReranker<G> {
    generator: G,
}

impl<G: TextGenerator> LlmReranker<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn prompt(candidates: &[Arc<Document>], query: &str, k: usize) -> String {
        let mut documents = String::new();
        for doc in candidates {
            let _ = write!(
                documents,
                "<document>\n<document_id>{}</document_id>\n<document_content>{}</document_content>\n</document>\n",
                doc.id, doc.content
            );
        }
        format!(
            "You are about to be given a set of documents, along with an id of each.\n\
             Your task is to select and sort the {k} most relevant documents to answer the user's question.\n\n\
             Here is the user's question:\n<question>\n{query}\n</question>\n\n\
             Here are the documents to select from:\n<documents>\n{documents}</documents>\n\n\
             Respond in the following format:\n\
             {JSON_FENCE_OPEN}\n{{\n    \"document_ids\": str[] # {k} document ids, most relevant first\n}}\n{FENCE}\n\n\
             {JSON_FENCE_OPEN}\n"
        )
    }

    /// Extracts the id list from a completion. A leading fence is tolerated in
    /// case the generator echoes it.
    pub fn parse(completion: &str) -> Result<Vec<DocId>> {
        let body = completion.trim();
        let body = body.strip_prefix(JSON_FENCE_OPEN).unwrap_or(body);
        let body = body.strip_suffix(FENCE).unwrap_or(body).trim();
        serde_json::from_str::<RerankResponse>(body)
            .map(|r| r.document_ids)
            .map_err(|e| Error::external("reranker", format!("unparsable ranking {body:?}: {e}")))
    }
}

impl<G: TextGenerator> Reranker for LlmReranker<G> {
    #[instrument(skip_all, fields(candidates = candidates.len(), k = k))]
    fn rerank(&self, candidates: &[Arc<Document>], query: &str, k: usize) -> Result<Vec<DocId>> {
        let completion = self.generator.complete(&Self::prompt(candidates, query, k), &[FENCE])?;
        let ids = Self::parse(&completion)?;
        debug!(returned = ids.len(), "reranked");
        Ok(ids)
    }
}

/// Reorders `candidates` to follow `ranked`.
///
/// Ids that are not candidates are dropped, and only the first occurrence of
/// a repeated id counts. Candidates the ranking leaves out are dropped or
/// appended in their fused order, depending on `missing`. Scores are kept.
pub fn apply_ranking(candidates: Vec<FusedHit>, ranked: &[DocId], missing: MissingCandidates) -> Vec<FusedHit> {
    let mut slots: Vec<Option<FusedHit>> = candidates.into_iter().map(Some).collect();
    let lookup: HashMap<DocId, usize> = slots
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(i, h)| h.as_ref().map(|h| (h.id().to_string(), i)))
        .collect();

    let mut out = Vec::with_capacity(slots.len());
    for id in ranked {
        match lookup.get(id) {
            Some(&i) => {
                if let Some(hit) = slots[i].take() {
                    out.push(hit);
                }
            }
            None => warn!(id = %id, "reranker returned an unknown document id; dropped"),
        }
    }

    let left_out = slots.iter().filter(|s| s.is_some()).count();
    if left_out > 0 {
        match missing {
            MissingCandidates::Drop => debug!(dropped = left_out, "candidates omitted by the reranker dropped"),
            MissingCandidates::Append => {
                debug!(appended = left_out, "candidates omitted by the reranker appended");
                out.extend(slots.into_iter().flatten());
            }
        }
    }
    out
}

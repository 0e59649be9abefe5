// Reciprocal Rank Fusion (RRF)

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use ragfuse_core::types::{FusedHit, SearchHit};

/// Attenuation constant recommended by Cormack, Clarke and Buettcher (SIGIR 2009).
pub const DEFAULT_K_RRF: f32 = 60.0;

/// Merge ranked lists into one ranking.
///
/// `score(d) = Σ 1 / (k_rrf + rank_i(d))` over every list `i` that contains `d`,
/// with ranks starting at 1. Documents are identified by id; the first copy
/// seen supplies the returned document. Within a single list only the best
/// rank of an id counts.
///
/// Output is sorted by descending score. Equal scores keep first-seen order:
/// list order first, then position inside the list.
#[instrument(skip_all, fields(lists = lists.len(), k_rrf = k_rrf))]
pub fn reciprocal_rank_fusion(lists: &[Vec<SearchHit>], k_rrf: f32) -> Vec<FusedHit> {
    let mut fused: Vec<FusedHit> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for list in lists {
        let mut seen_here: HashSet<&str> = HashSet::new();
        for (rank, hit) in list.iter().enumerate() {
            if !seen_here.insert(hit.id()) {
                continue;
            }
            let contribution = 1.0 / (k_rrf + (rank + 1) as f32);
            match position.get(hit.id()) {
                Some(&i) => fused[i].score += contribution,
                None => {
                    position.insert(hit.id(), fused.len());
                    fused.push(FusedHit { document: hit.document.clone(), score: contribution });
                }
            }
        }
    }

    fused.retain(|h| h.score > 0.0);
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    debug!(candidates = fused.len(), "fused");
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragfuse_core::types::{Document, SourceKind};
    use std::sync::Arc;

    fn list(ids: &[&str]) -> Vec<SearchHit> {
        ids.iter()
            .map(|id| SearchHit { document: Arc::new(Document::with_id(*id, *id)), score: 1.0, source: SourceKind::Other })
            .collect()
    }

    fn ids(hits: &[FusedHit]) -> Vec<&str> {
        hits.iter().map(FusedHit::id).collect()
    }

    #[test]
    fn documents_in_both_lists_rise() {
        let fused = reciprocal_rank_fusion(&[list(&["1", "2", "3"]), list(&["3", "1", "4"])], DEFAULT_K_RRF);
        assert_eq!(ids(&fused), vec!["1", "3", "2", "4"]);
        assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-7);
    }

    #[test]
    fn single_list_keeps_its_order() {
        let fused = reciprocal_rank_fusion(&[list(&["a", "b", "c"]), vec![]], DEFAULT_K_RRF);
        assert_eq!(ids(&fused), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_follow_list_registration_order() {
        let fused = reciprocal_rank_fusion(&[list(&["x"]), list(&["y"])], DEFAULT_K_RRF);
        assert_eq!(ids(&fused), vec!["x", "y"]);
        assert_eq!(fused[0].score, fused[1].score);
    }

    #[test]
    fn repeated_id_in_one_list_counts_once() {
        let fused = reciprocal_rank_fusion(&[list(&["a", "a"])], 0.0);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].score, 1.0);
    }

    #[test]
    fn no_lists_no_output() {
        assert!(reciprocal_rank_fusion(&[], DEFAULT_K_RRF).is_empty());
        assert!(reciprocal_rank_fusion(&[vec![], vec![]], DEFAULT_K_RRF).is_empty());
    }
}

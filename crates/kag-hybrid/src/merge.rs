//! Weighted fusion of the vector and text result streams.
//!
//! Each stream is normalized by its own batch maximum, so scores are only
//! comparable within one merge call.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use kag_core::config::SearchSettings;
use kag_core::types::{DocId, MergedCandidate, RawCandidate};

#[derive(Debug, Clone)]
pub struct ResultMerger {
    min_score_threshold: f32,
}

impl ResultMerger {
    pub fn new(min_score_threshold: f32) -> Self {
        Self { min_score_threshold }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(settings.min_score_threshold)
    }

    pub fn min_score_threshold(&self) -> f32 {
        self.min_score_threshold
    }

    /// Merge both streams with vector weight `weight` (expected in [0,1],
    /// not validated) and keep the best `top_k`.
    ///
    /// Ordering is by `combined_score` descending; ties keep insertion
    /// order, vector stream first.
    pub fn merge(&self, vector: &[RawCandidate], text: &[RawCandidate], weight: f32, top_k: usize) -> Vec<MergedCandidate> {
        let vec_max = batch_max(vector);
        let txt_max = batch_max(text);

        let mut merged: Vec<MergedCandidate> = Vec::with_capacity(vector.len() + text.len());
        let mut positions: HashMap<DocId, usize> = HashMap::new();

        for hit in vector {
            let score = normalize(hit.raw_score, vec_max);
            match positions.get(&hit.doc_id) {
                Some(&i) => merged[i].vector_score = merged[i].vector_score.max(score),
                None => {
                    positions.insert(hit.doc_id, merged.len());
                    merged.push(MergedCandidate {
                        doc_id: hit.doc_id,
                        content: hit.content.clone(),
                        vector_score: score,
                        text_score: 0.0,
                        combined_score: 0.0,
                    });
                }
            }
        }
        for hit in text {
            let score = normalize(hit.raw_score, txt_max);
            match positions.get(&hit.doc_id) {
                Some(&i) => {
                    let entry = &mut merged[i];
                    entry.text_score = entry.text_score.max(score);
                    if entry.content.is_empty() {
                        entry.content = hit.content.clone();
                    }
                }
                None => {
                    positions.insert(hit.doc_id, merged.len());
                    merged.push(MergedCandidate {
                        doc_id: hit.doc_id,
                        content: hit.content.clone(),
                        vector_score: 0.0,
                        text_score: score,
                        combined_score: 0.0,
                    });
                }
            }
        }

        let unique = merged.len();
        for m in &mut merged {
            m.combined_score = weight * m.vector_score + (1.0 - weight) * m.text_score;
        }
        merged.retain(|m| m.combined_score >= self.min_score_threshold);
        merged.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
        merged.truncate(top_k);

        debug!(
            vector = vector.len(),
            text = text.len(),
            vec_max,
            txt_max,
            unique,
            kept = merged.len(),
            weight,
            threshold = self.min_score_threshold,
            "merged result streams"
        );
        merged
    }
}

/// Largest raw score of a batch. Empty batches and non-positive maxima use
/// 1.0 so normalization never divides by zero or flips signs.
fn batch_max(batch: &[RawCandidate]) -> f32 {
    let max = batch.iter().map(|c| c.raw_score).filter(|s| s.is_finite()).fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 { max } else { 1.0 }
}

fn normalize(raw: f32, max: f32) -> f32 {
    if raw.is_finite() { (raw / max).clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(doc_id: DocId, score: f32) -> RawCandidate {
        RawCandidate::vector(doc_id, format!("vector doc {doc_id}"), score)
    }

    fn t(doc_id: DocId, score: f32) -> RawCandidate {
        RawCandidate::text(doc_id, format!("text doc {doc_id}"), score)
    }

    #[test]
    fn weighted_merge_matches_worked_example() {
        let merged = ResultMerger::new(0.15).merge(&[v(1, 0.9), v(2, 0.5)], &[t(2, 4.0)], 0.7, 10);
        let ids: Vec<DocId> = merged.iter().map(|m| m.doc_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!((merged[0].combined_score - 0.7).abs() < 1e-6);
        assert!((merged[1].combined_score - (0.7 * (0.5 / 0.9) + 0.3)).abs() < 1e-6);
        assert!((merged[1].combined_score - 0.689).abs() < 1e-3);
        assert_eq!(merged[1].content, "vector doc 2", "vector content preferred");
        assert_eq!(merged[0].text_score, 0.0);
    }

    #[test]
    fn both_streams_empty_yields_empty() {
        assert!(ResultMerger::new(0.15).merge(&[], &[], 0.7, 5).is_empty());
    }

    #[test]
    fn threshold_drops_weak_candidates() {
        let merged = ResultMerger::new(0.5).merge(&[v(1, 1.0), v(2, 0.2)], &[], 1.0, 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].doc_id, 1);
    }

    #[test]
    fn truncates_to_top_k() {
        let vector: Vec<RawCandidate> = (1..=8).map(|i| v(i, i as f32)).collect();
        let merged = ResultMerger::new(0.0).merge(&vector, &[], 0.7, 3);
        let ids: Vec<DocId> = merged.iter().map(|m| m.doc_id).collect();
        assert_eq!(ids, vec![8, 7, 6]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let merged = ResultMerger::new(0.0).merge(&[v(5, 1.0)], &[t(3, 1.0)], 0.5, 10);
        let ids: Vec<DocId> = merged.iter().map(|m| m.doc_id).collect();
        assert_eq!(ids, vec![5, 3]);
    }

    #[test]
    fn text_content_fills_empty_vector_content() {
        let vector = [RawCandidate::vector(1, "", 1.0)];
        let merged = ResultMerger::new(0.0).merge(&vector, &[t(1, 2.0)], 0.5, 10);
        assert_eq!(merged[0].content, "text doc 1");
    }

    #[test]
    fn duplicate_doc_in_one_stream_keeps_best_score() {
        let merged = ResultMerger::new(0.0).merge(&[v(1, 1.0), v(1, 0.1)], &[], 1.0, 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].vector_score, 1.0);
    }

    #[test]
    fn non_positive_scores_do_not_break_normalization() {
        let merged = ResultMerger::new(0.0).merge(&[v(1, -0.3), v(2, 0.0)], &[t(3, f32::NAN)], 0.5, 10);
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|m| (0.0..=1.0).contains(&m.vector_score) && (0.0..=1.0).contains(&m.text_score)));
    }

    fn stream(max_len: usize) -> impl Strategy<Value = Vec<(DocId, f32)>> {
        prop::collection::vec((0i64..30, 0.01f32..50.0), 0..max_len)
    }

    fn to_candidates(raw: &[(DocId, f32)], text: bool) -> Vec<RawCandidate> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<RawCandidate> = raw
            .iter()
            .filter(|(id, _)| seen.insert(*id))
            .map(|&(id, s)| if text { t(id, s) } else { v(id, s) })
            .collect();
        out.sort_by(|a, b| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(Ordering::Equal));
        out
    }

    proptest! {
        #[test]
        fn normalized_scores_are_bounded_and_max_is_one(vr in stream(20), tr in stream(20), w in 0.0f32..=1.0) {
            let vector = to_candidates(&vr, false);
            let text = to_candidates(&tr, true);
            let merged = ResultMerger::new(0.0).merge(&vector, &text, w, usize::MAX);
            for m in &merged {
                prop_assert!((0.0..=1.0).contains(&m.vector_score));
                prop_assert!((0.0..=1.0).contains(&m.text_score));
            }
            if let Some(top) = vector.first() {
                let m = merged.iter().find(|m| m.doc_id == top.doc_id).unwrap();
                prop_assert_eq!(m.vector_score, 1.0);
            }
            if let Some(top) = text.first() {
                let m = merged.iter().find(|m| m.doc_id == top.doc_id).unwrap();
                prop_assert_eq!(m.text_score, 1.0);
            }
        }

        #[test]
        fn zero_threshold_keeps_full_union(vr in stream(20), tr in stream(20), w in 0.0f32..=1.0) {
            let vector = to_candidates(&vr, false);
            let text = to_candidates(&tr, true);
            let union: std::collections::HashSet<DocId> = vector.iter().chain(text.iter()).map(|c| c.doc_id).collect();
            let merged = ResultMerger::new(0.0).merge(&vector, &text, w, usize::MAX);
            prop_assert_eq!(merged.len(), union.len());
        }

        #[test]
        fn nothing_below_threshold_survives(vr in stream(20), tr in stream(20), w in 0.0f32..=1.0, threshold in 0.0f32..=1.0) {
            let merged = ResultMerger::new(threshold).merge(&to_candidates(&vr, false), &to_candidates(&tr, true), w, usize::MAX);
            prop_assert!(merged.iter().all(|m| m.combined_score >= threshold));
            for pair in merged.windows(2) {
                prop_assert!(pair[0].combined_score >= pair[1].combined_score);
            }
        }

        #[test]
        fn extreme_weights_follow_single_stream(vr in stream(20), tr in stream(20)) {
            let vector = to_candidates(&vr, false);
            let text = to_candidates(&tr, true);
            let merger = ResultMerger::new(0.0);
            let vector_only = merger.merge(&vector, &text, 1.0, usize::MAX);
            for pair in vector_only.windows(2) {
                prop_assert!(pair[0].vector_score >= pair[1].vector_score);
            }
            let text_only = merger.merge(&vector, &text, 0.0, usize::MAX);
            for pair in text_only.windows(2) {
                prop_assert!(pair[0].text_score >= pair[1].text_score);
            }
        }

        #[test]
        fn merging_is_deterministic(vr in stream(20), tr in stream(20), w in 0.0f32..=1.0) {
            let vector = to_candidates(&vr, false);
            let text = to_candidates(&tr, true);
            let merger = ResultMerger::new(0.15);
            prop_assert_eq!(merger.merge(&vector, &text, w, 10), merger.merge(&vector, &text, w, 10));
        }
    }
}

//! Deduplication and ranking of search hits.

use std::cmp::Ordering;
use std::collections::HashMap;

use clinical_store::ScoredRecord;

/// Final ordering: score descending, then document date descending with
/// undated records last, then record id for a total, stable order.
fn compare(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| match (a.payload.document_date, b.payload.document_date) {
            (Some(da), Some(db)) => db.cmp(&da),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.record_id.cmp(&b.record_id))
}

/// Merge hits from one or more searches into a ranked top-k list.
///
/// A record appearing more than once (e.g. in both per-modality
/// searches) keeps its best score and appears once.
pub fn rank(hits: Vec<ScoredRecord>, top_k: usize) -> Vec<ScoredRecord> {
    let mut best: HashMap<String, ScoredRecord> = HashMap::with_capacity(hits.len());
    for hit in hits {
        match best.get(&hit.record_id) {
            Some(existing) if existing.score >= hit.score => {}
            _ => {
                best.insert(hit.record_id.clone(), hit);
            }
        }
    }
    let mut ranked: Vec<ScoredRecord> = best.into_values().collect();
    ranked.sort_by(compare);
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use clinical_types::{Modality, RecordPayload};

    fn hit(id: &str, score: f32, date: Option<(i32, u32, u32)>) -> ScoredRecord {
        ScoredRecord {
            record_id: id.to_string(),
            score,
            payload: RecordPayload {
                record_id: id.to_string(),
                patient_id: "P001".to_string(),
                modality: Modality::Text,
                source_path: format!("/data/{}.txt", id),
                document_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
                category: None,
                raw_text_excerpt: None,
                content_hash: "h".to_string(),
                ingested_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_rank_orders_by_score_descending() {
        let ranked = rank(
            vec![hit("a", 0.2, None), hit("b", 0.9, None), hit("c", 0.5, None)],
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|h| h.record_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_equal_scores_break_on_recency() {
        let ranked = rank(
            vec![
                hit("older", 0.8, Some((2022, 3, 1))),
                hit("newer", 0.8, Some((2024, 3, 1))),
                hit("undated", 0.8, None),
            ],
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|h| h.record_id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older", "undated"]);
    }

    #[test]
    fn test_duplicates_keep_best_score() {
        let ranked = rank(vec![hit("a", 0.4, None), hit("a", 0.7, None)], 10);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].score - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let hits = (0..10).map(|i| hit(&format!("r{}", i), i as f32 / 10.0, None));
        let ranked = rank(hits.collect(), 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].record_id, "r9");
    }

    #[test]
    fn test_rank_is_deterministic_for_full_ties() {
        let a = rank(vec![hit("x", 0.5, None), hit("y", 0.5, None)], 10);
        let b = rank(vec![hit("y", 0.5, None), hit("x", 0.5, None)], 10);
        let ids_a: Vec<_> = a.iter().map(|h| h.record_id.as_str()).collect();
        let ids_b: Vec<_> = b.iter().map(|h| h.record_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}

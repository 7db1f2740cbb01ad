use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use crate::normalize::{self, NormalizedRow, UNKNOWN_NAME, normalized_key};

/// The single, deduplicated standing of one entity on one day.
/// `rank_position` is 0 until `assign_ranks` has run.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub entity_id: String,
    pub display_name: String,
    pub score: Option<f64>,
    pub volume: Option<f64>,
    pub sentiment: Option<f64>,
    pub rank_position: u32,
}

/// Collapse one day's normalized rows into one record per entity.
///
/// Grouping key is the entity id when the row has one, otherwise the
/// normalized display name. When several rows land on the same key the
/// incumbent is kept unless the candidate has a score and the incumbent
/// does not, or both have one and the candidate's is strictly greater.
/// Scores are never summed or averaged. First-seen group order is kept.
pub fn aggregate(rows: &[NormalizedRow]) -> Vec<CanonicalRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CanonicalRecord> = Vec::new();

    for row in rows {
        let name = row.display_name.trim();
        if name.is_empty() || name == UNKNOWN_NAME {
            continue;
        }

        let key = match &row.entity_id {
            Some(id) => id.clone(),
            None => normalized_key(name),
        };

        let candidate = CanonicalRecord {
            entity_id: key.clone(),
            display_name: name.to_string(),
            score: row.score,
            volume: row.volume,
            sentiment: row.sentiment,
            rank_position: 0,
        };

        match index.get(&key) {
            None => {
                index.insert(key, out.len());
                out.push(candidate);
            }
            Some(&slot) => {
                if candidate_wins(out[slot].score, candidate.score) {
                    out[slot] = candidate;
                }
            }
        }
    }

    out
}

fn candidate_wins(incumbent: Option<f64>, candidate: Option<f64>) -> bool {
    match (incumbent, candidate) {
        (None, Some(_)) => true,
        (Some(a), Some(b)) => b > a,
        _ => false,
    }
}

/// Sort by score descending (missing scores last, keeping their relative
/// order) and assign 1-based competition ranks: equal scores share a rank,
/// the next distinct score takes its ordinal position. Records without a
/// score are positionally ranked but conceptually unranked.
pub fn assign_ranks(mut records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    records.sort_by(|a, b| match (a.score, b.score) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
    });

    let mut last_score: Option<f64> = None;
    let mut last_rank: u32 = 0;
    for (i, record) in records.iter_mut().enumerate() {
        let ordinal = (i + 1) as u32;
        match record.score {
            Some(score) if last_score == Some(score) => {
                record.rank_position = last_rank;
            }
            Some(score) => {
                record.rank_position = ordinal;
                last_rank = ordinal;
                last_score = Some(score);
            }
            None => {
                record.rank_position = ordinal;
            }
        }
    }

    records
}

/// Full reconciliation pass for one day: normalize, aggregate, rank.
/// Pure and deterministic for identical input.
pub fn reconcile(raw_rows: &[Value]) -> Vec<CanonicalRecord> {
    let normalized: Vec<NormalizedRow> = raw_rows.iter().map(normalize::normalize).collect();
    assign_ranks(aggregate(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, score: Option<f64>) -> NormalizedRow {
        NormalizedRow {
            entity_id: None,
            display_name: name.to_string(),
            score,
            volume: None,
            sentiment: None,
            rank: None,
        }
    }

    #[test]
    fn aggregate_groups_by_normalized_name_without_id() {
        let rows = vec![row("São Paulo", Some(10.0)), row("SAO PAULO", Some(12.0))];
        let out = aggregate(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, Some(12.0));
        assert_eq!(out[0].display_name, "São Paulo");
    }

    #[test]
    fn aggregate_drops_unknown_and_empty_names() {
        let rows = vec![row(UNKNOWN_NAME, Some(50.0)), row("  ", Some(9.0)), row("Remo", None)];
        let out = aggregate(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].display_name, "Remo");
    }

    #[test]
    fn same_id_different_spellings_merge() {
        let mut a = row("Vasco", Some(5.0));
        a.entity_id = Some("c1".to_string());
        let mut b = row("Vasco da Gama", Some(8.0));
        b.entity_id = Some("c1".to_string());
        let out = aggregate(&[a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, Some(8.0));
        assert_eq!(out[0].display_name, "Vasco da Gama");
    }
}

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::ranking::CanonicalRecord;

/// Score movement for one entity present in both compared slices.
#[derive(Debug, Clone, PartialEq)]
pub struct AbDelta {
    pub name: String,
    pub delta: f64,
    pub score_a: f64,
    pub score_b: f64,
    pub rank_a: Option<u32>,
    pub rank_b: Option<u32>,
}

/// Comparison of a Top-N slice from two days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbSummary {
    /// Names in B's slice but not A's, in B's order.
    pub entered: Vec<String>,
    /// Names in A's slice but not B's, in A's order.
    pub exited: Vec<String>,
    pub best_up: Option<(String, f64)>,
    pub best_down: Option<(String, f64)>,
    /// Every computable common entity, sorted by delta descending.
    pub deltas: Vec<AbDelta>,
}

/// Compare two Top-N slices by display name. Deltas (`score B − score A`)
/// exist only for names common to both slices with a score on both sides;
/// `best_up`/`best_down` are `None` when no such pair exists.
pub fn build_ab_summary(top_a: &[CanonicalRecord], top_b: &[CanonicalRecord]) -> AbSummary {
    let names_a: Vec<&str> = top_a.iter().map(|r| r.display_name.as_str()).collect();
    let names_b: Vec<&str> = top_b.iter().map(|r| r.display_name.as_str()).collect();
    let set_a: HashSet<&str> = names_a.iter().copied().collect();
    let set_b: HashSet<&str> = names_b.iter().copied().collect();

    let entered = names_b
        .iter()
        .filter(|n| !set_a.contains(*n))
        .map(|n| n.to_string())
        .collect();
    let exited = names_a
        .iter()
        .filter(|n| !set_b.contains(*n))
        .map(|n| n.to_string())
        .collect();

    let map_b: HashMap<&str, &CanonicalRecord> =
        top_b.iter().map(|r| (r.display_name.as_str(), r)).collect();

    let mut best_up: Option<(String, f64)> = None;
    let mut best_down: Option<(String, f64)> = None;
    let mut deltas: Vec<AbDelta> = Vec::new();

    for a in top_a {
        let Some(b) = map_b.get(a.display_name.as_str()) else { continue };
        let (Some(score_a), Some(score_b)) = (a.score, b.score) else { continue };

        let delta = score_b - score_a;
        deltas.push(AbDelta {
            name: a.display_name.clone(),
            delta,
            score_a,
            score_b,
            rank_a: rank_of(a),
            rank_b: rank_of(b),
        });

        if best_up.as_ref().is_none_or(|(_, best)| delta > *best) {
            best_up = Some((a.display_name.clone(), delta));
        }
        if best_down.as_ref().is_none_or(|(_, worst)| delta < *worst) {
            best_down = Some((a.display_name.clone(), delta));
        }
    }

    deltas.sort_by(|x, y| y.delta.partial_cmp(&x.delta).unwrap_or(Ordering::Equal));

    AbSummary { entered, exited, best_up, best_down, deltas }
}

fn rank_of(record: &CanonicalRecord) -> Option<u32> {
    (record.rank_position > 0).then_some(record.rank_position)
}

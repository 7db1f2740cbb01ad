use std::collections::HashMap;

use chrono::{Days, NaiveDate};

use crate::normalize::normalized_key;
use crate::ranking::CanonicalRecord;

/// Previous-day standing kept for trend lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct PrevMetrics {
    pub rank: u32,
    pub score: Option<f64>,
    pub volume: Option<f64>,
    pub sentiment: Option<f64>,
}

/// One previous day's canonical records, indexed three ways for lookup:
/// by entity id, by normalized display name, and by raw display name.
/// Built whole for a reference date and replaced — never patched — when
/// the reference date changes.
#[derive(Debug, Clone)]
pub struct PrevSnapshot {
    pub date: NaiveDate,
    by_id: HashMap<String, PrevMetrics>,
    by_key: HashMap<String, PrevMetrics>,
    by_name: HashMap<String, PrevMetrics>,
}

impl PrevSnapshot {
    pub fn build(date: NaiveDate, records: &[CanonicalRecord]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_key = HashMap::new();
        let mut by_name = HashMap::new();

        for record in records {
            if record.rank_position == 0 {
                continue;
            }
            let metrics = PrevMetrics {
                rank: record.rank_position,
                score: record.score,
                volume: record.volume,
                sentiment: record.sentiment,
            };
            by_id.entry(record.entity_id.clone()).or_insert_with(|| metrics.clone());
            by_key
                .entry(normalized_key(&record.display_name))
                .or_insert_with(|| metrics.clone());
            by_name
                .entry(record.display_name.clone())
                .or_insert(metrics);
        }

        Self { date, by_id, by_key, by_name }
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_name.is_empty()
    }

    /// Id first, normalized name second, raw name last.
    pub fn lookup(&self, record: &CanonicalRecord) -> Option<&PrevMetrics> {
        self.by_id
            .get(&record.entity_id)
            .or_else(|| self.by_key.get(&normalized_key(&record.display_name)))
            .or_else(|| self.by_name.get(&record.display_name))
    }
}

/// Day-over-day movement. A zero `rank_delta` is a real "flat" trend,
/// distinct from no trend being available at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    /// `previous rank − current rank`; positive means the entity moved up.
    pub rank_delta: i64,
    /// `current score − previous score`; `None` when either side is missing.
    pub score_delta: Option<f64>,
}

/// `None` when there is no snapshot, no match for this entity, or the
/// current record never got a rank.
pub fn compute_trend(current: &CanonicalRecord, previous: Option<&PrevSnapshot>) -> Option<Trend> {
    let snapshot = previous?;
    if current.rank_position == 0 {
        return None;
    }
    let prev = snapshot.lookup(current)?;

    let rank_delta = prev.rank as i64 - current.rank_position as i64;
    let score_delta = match (current.score, prev.score) {
        (Some(curr), Some(before)) => Some(curr - before),
        _ => None,
    };
    Some(Trend { rank_delta, score_delta })
}

/// Calendar day before `date`, UTC arithmetic only.
pub fn prev_day(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mover {
    pub display_name: String,
    pub rank_delta: i64,
    pub current_rank: u32,
}

/// The `n` biggest climbers and the `n` biggest fallers for the day.
/// Entities without a trend are left out entirely.
pub fn top_movers(
    records: &[CanonicalRecord],
    previous: Option<&PrevSnapshot>,
    n: usize,
) -> (Vec<Mover>, Vec<Mover>) {
    let mut moved: Vec<Mover> = records
        .iter()
        .filter_map(|record| {
            let trend = compute_trend(record, previous)?;
            (trend.rank_delta != 0).then(|| Mover {
                display_name: record.display_name.clone(),
                rank_delta: trend.rank_delta,
                current_rank: record.rank_position,
            })
        })
        .collect();

    moved.sort_by(|a, b| b.rank_delta.cmp(&a.rank_delta));
    let up: Vec<Mover> = moved.iter().filter(|m| m.rank_delta > 0).take(n).cloned().collect();
    let down: Vec<Mover> = moved
        .iter()
        .rev()
        .filter(|m| m.rank_delta < 0)
        .take(n)
        .cloned()
        .collect();
    (up, down)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, score: Option<f64>, rank: u32) -> CanonicalRecord {
        CanonicalRecord {
            entity_id: id.to_string(),
            display_name: name.to_string(),
            score,
            volume: None,
            sentiment: None,
            rank_position: rank,
        }
    }

    #[test]
    fn lookup_prefers_id_then_key_then_raw_name() {
        let prev = PrevSnapshot::build(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            &[record("c1", "Grêmio", Some(30.0), 4)],
        );

        // Same id, different spelling: id wins.
        let by_id = record("c1", "Gremio FBPA", Some(31.0), 2);
        assert!(prev.lookup(&by_id).is_some());

        // Different id, accent-variant name: normalized key wins.
        let by_key = record("x9", "GREMIO", Some(31.0), 2);
        assert!(prev.lookup(&by_key).is_some());

        // Neither id nor key: raw name still matches.
        let by_name = record("x9", "Grêmio", Some(31.0), 2);
        assert!(prev.lookup(&by_name).is_some());

        let miss = record("x9", "Cuiabá", Some(31.0), 2);
        assert!(prev.lookup(&miss).is_none());
    }

    #[test]
    fn zero_delta_is_flat_not_unavailable() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let prev = PrevSnapshot::build(date, &[record("c1", "Remo", Some(10.0), 3)]);
        let trend = compute_trend(&record("c1", "Remo", Some(10.0), 3), Some(&prev));
        assert_eq!(trend, Some(Trend { rank_delta: 0, score_delta: Some(0.0) }));
    }

    #[test]
    fn prev_day_crosses_month_boundaries() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(prev_day(d), NaiveDate::from_ymd_opt(2024, 2, 29));
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Days, NaiveDate};
use serde_json::Value;

use crate::normalize::parse_score;

/// One dated observation in an entity's score series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One series re-expressed over the shared date axis. `has_gaps` tells the
/// presentation layer the `None` entries are meaningful and must not be
/// bridged in the data model.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub values: Vec<Option<f64>>,
    pub has_gaps: bool,
}

/// Several named series over one contiguous, ascending, gap-filled date
/// axis. Every value vector has exactly `labels.len()` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedSeriesSet {
    pub labels: Vec<NaiveDate>,
    pub series: BTreeMap<String, AlignedSeries>,
}

/// Parse an ISO `YYYY-MM-DD` prefix; longer timestamp strings are accepted
/// and truncated.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.len() < 10 {
        return None;
    }
    NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok()
}

/// Keep rows with a parseable date and a present numeric value, sorted
/// ascending by date, one point per date (first occurrence wins).
pub fn normalize_series(rows: &[Value]) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = rows
        .iter()
        .filter_map(|row| {
            let date = row.get("date").and_then(Value::as_str).and_then(parse_iso_date)?;
            let value = parse_score(row.get("value")?)?;
            Some(SeriesPoint { date, value })
        })
        .collect();

    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    points
}

/// Align all input series onto one shared calendar-date axis.
///
/// The axis spans min..=max across every series with no gaps, generated by
/// plain calendar stepping (UTC dates only, so no DST skips or repeats).
/// Values are matched by exact date; absent dates become `None`. No
/// interpolation happens here.
pub fn align(series_by_name: &BTreeMap<String, Vec<SeriesPoint>>) -> AlignedSeriesSet {
    let all_dates: BTreeSet<NaiveDate> = series_by_name
        .values()
        .flat_map(|points| points.iter().map(|p| p.date))
        .collect();

    let (Some(&min), Some(&max)) = (all_dates.first(), all_dates.last()) else {
        return AlignedSeriesSet::default();
    };

    let mut labels = Vec::new();
    let mut cursor = min;
    while cursor <= max {
        labels.push(cursor);
        let Some(next) = cursor.checked_add_days(Days::new(1)) else { break };
        cursor = next;
    }

    let series = series_by_name
        .iter()
        .map(|(name, points)| {
            let lookup: HashMap<NaiveDate, f64> =
                points.iter().map(|p| (p.date, p.value)).collect();
            let values: Vec<Option<f64>> =
                labels.iter().map(|d| lookup.get(d).copied()).collect();
            let has_gaps = values.iter().any(Option::is_none);
            (name.clone(), AlignedSeries { values, has_gaps })
        })
        .collect();

    AlignedSeriesSet { labels, series }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    #[test]
    fn normalize_series_sorts_filters_and_dedupes() {
        let rows = vec![
            json!({ "date": "2024-01-05", "value": "2,5" }),
            json!({ "date": "2024-01-01T00:00:00Z", "value": 1 }),
            json!({ "date": "2024-01-01", "value": 99 }),
            json!({ "date": "not a date", "value": 3 }),
            json!({ "date": "2024-01-02", "value": null }),
        ];
        let points = normalize_series(&rows);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], SeriesPoint { date: d("2024-01-01"), value: 1.0 });
        assert_eq!(points[1], SeriesPoint { date: d("2024-01-05"), value: 2.5 });
    }

    #[test]
    fn align_empty_input_is_empty_set() {
        let out = align(&BTreeMap::new());
        assert!(out.labels.is_empty());
        assert!(out.series.is_empty());
    }

    #[test]
    fn aligned_lengths_always_match_labels() {
        let mut input = BTreeMap::new();
        input.insert(
            "a".to_string(),
            vec![SeriesPoint { date: d("2024-02-27"), value: 1.0 }],
        );
        input.insert(
            "b".to_string(),
            vec![SeriesPoint { date: d("2024-03-02"), value: 2.0 }],
        );
        let out = align(&input);
        // Leap year: 27, 28, 29 Feb, 1, 2 Mar.
        assert_eq!(out.labels.len(), 5);
        for aligned in out.series.values() {
            assert_eq!(aligned.values.len(), out.labels.len());
            assert!(aligned.has_gaps);
        }
    }
}

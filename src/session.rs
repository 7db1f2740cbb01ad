use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use log::debug;

use crate::api::{self, ApiError, RankingFilters};
use crate::series::SeriesPoint;
use crate::store::Store;
use crate::trend::{self, PrevSnapshot};

/// Explicit cancellation token threaded through request-scoped fetch
/// sequences. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Owns the live token for one request purpose. Beginning a new request
/// synchronously cancels the predecessor's token, so a stale response can
/// never overwrite fresher state.
#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Option<CancelToken>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> CancelToken {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        self.current = Some(token.clone());
        token
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

/// Outcome of a cancellable fetch. Cancellation is normal control flow,
/// never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Complete(T),
    Cancelled,
}

/// Request-scoped holder of the previous-day snapshot. The snapshot is
/// built whole for one reference date and replaced whole when the
/// reference date changes; it is never patched in place.
#[derive(Debug, Default)]
pub struct PrevSnapshotSlot {
    state: Option<(NaiveDate, PrevSnapshot)>,
}

impl PrevSnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held snapshot, only if it belongs to `reference_date`.
    pub fn get(&self, reference_date: NaiveDate) -> Option<&PrevSnapshot> {
        match &self.state {
            Some((held, snapshot)) if *held == reference_date => Some(snapshot),
            _ => None,
        }
    }

    pub fn replace(&mut self, reference_date: NaiveDate, snapshot: PrevSnapshot) {
        self.state = Some((reference_date, snapshot));
    }

    pub fn clear(&mut self) {
        self.state = None;
    }
}

/// Fetch and reconcile the ranking for the day before `reference_date`.
/// A reference date with no previous calendar day yields an empty
/// snapshot; a cancelled token discards whatever was fetched.
pub fn fetch_prev_snapshot(
    store: &dyn Store,
    reference_date: NaiveDate,
    topic: Option<&str>,
    token: &CancelToken,
) -> Result<Fetched<PrevSnapshot>, ApiError> {
    let Some(prev_date) = trend::prev_day(reference_date) else {
        return Ok(Fetched::Complete(PrevSnapshot::build(reference_date, &[])));
    };
    if token.is_cancelled() {
        return Ok(Fetched::Cancelled);
    }

    let filters = RankingFilters {
        date: Some(prev_date),
        topic: topic.map(str::to_string),
        limit: None,
    };
    let day = api::daily_ranking(store, &filters)?;

    if token.is_cancelled() {
        debug!("previous-day fetch for {prev_date} superseded, discarding");
        return Ok(Fetched::Cancelled);
    }
    Ok(Fetched::Complete(PrevSnapshot::build(prev_date, &day.records)))
}

/// Series per comparison label, valid for exactly one selection set.
/// Invalidated by replacement when the selection changes.
#[derive(Debug, Default)]
pub struct CompareCache {
    selection: Vec<String>,
    series: BTreeMap<String, Vec<SeriesPoint>>,
}

impl CompareCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self, selection: &[String]) -> bool {
        self.selection == selection
    }

    pub fn series(&self) -> &BTreeMap<String, Vec<SeriesPoint>> {
        &self.series
    }

    pub fn replace(&mut self, selection: Vec<String>, series: BTreeMap<String, Vec<SeriesPoint>>) {
        self.selection = selection;
        self.series = series;
    }
}

/// Fetch the series for every name in a comparison selection.
///
/// Items run sequentially; the token is checked before each one. On
/// cancellation the remaining items are abandoned and partial results are
/// discarded, not merged.
pub fn fetch_compare_batch(
    store: &dyn Store,
    names: &[String],
    limit_days: Option<u32>,
    token: &CancelToken,
) -> Result<Fetched<BTreeMap<String, Vec<SeriesPoint>>>, ApiError> {
    let mut out: BTreeMap<String, Vec<SeriesPoint>> = BTreeMap::new();

    for name in names {
        if token.is_cancelled() {
            debug!("comparison batch superseded after {} of {} items", out.len(), names.len());
            return Ok(Fetched::Cancelled);
        }
        let series = api::entity_series(store, name, limit_days)?;
        out.insert(name.clone(), series.points());
    }

    if token.is_cancelled() {
        return Ok(Fetched::Cancelled);
    }
    Ok(Fetched::Complete(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_cancels_the_predecessor() {
        let mut slot = RequestSlot::new();
        let first = slot.begin();
        assert!(!first.is_cancelled());
        let second = slot.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn snapshot_slot_only_serves_its_reference_date() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let other = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();
        let mut slot = PrevSnapshotSlot::new();
        slot.replace(day, PrevSnapshot::build(day, &[]));
        assert!(slot.get(day).is_some());
        assert!(slot.get(other).is_none());
    }
}

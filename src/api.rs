use chrono::NaiveDate;
use log::info;
use serde_json::Value;
use thiserror::Error;

use crate::normalize::{parse_score, pick_number, pick_string};
use crate::ranking::{self, CanonicalRecord};
use crate::resolver::{
    self, ENTITY_COLUMN, MatchStrategy, ResolveError, ResolvedIdentity, SeriesShape,
};
use crate::series::{SeriesPoint, parse_iso_date};
use crate::store::{Store, StoreError, eq, limit, order_asc, order_desc, rows_from_payload, select};

const RANKING_COLLECTION: &str = "daily_ranking";
const DEFAULT_RANKING_LIMIT: u32 = 20;
const DEFAULT_SERIES_DAYS: u32 = 90;

/// Request-level failures, each mapping to an HTTP status class. Identity
/// and schema failures are recoverable conditions carrying enough context
/// for the consumer to render an explicit state instead of a generic error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("required parameter missing: {0}")]
    MissingParam(&'static str),
    #[error("entity not found: {entity}")]
    EntityNotFound { entity: String },
    #[error(transparent)]
    Schema(#[from] ResolveError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MissingParam(_) => 400,
            ApiError::EntityNotFound { .. } => 404,
            ApiError::Schema(_) | ApiError::Store(_) => 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankingFilters {
    pub date: Option<NaiveDate>,
    pub topic: Option<String>,
    pub limit: Option<u32>,
}

/// One day's reconciled ranking. `resolved_date` is the day the store
/// actually answered with, which may differ from the requested one when
/// the store falls back to the latest available day.
#[derive(Debug, Clone)]
pub struct RankingDay {
    pub resolved_date: Option<NaiveDate>,
    pub records: Vec<CanonicalRecord>,
}

/// Fetch raw ranking rows and run the full reconciliation pass.
/// Accepts both a bare row array and a `{data, resolved_date}` envelope.
pub fn daily_ranking(store: &dyn Store, filters: &RankingFilters) -> Result<RankingDay, ApiError> {
    let mut query = vec![
        select("*,club:clubs(name)"),
        order_desc("score"),
        limit(filters.limit.unwrap_or(DEFAULT_RANKING_LIMIT)),
    ];
    if let Some(date) = filters.date {
        query.push(eq("aggregation_date", &date.to_string()));
    }
    if let Some(topic) = &filters.topic {
        query.push(eq("theme", topic));
    }

    let payload = store.fetch(RANKING_COLLECTION, &query)?;
    let envelope_date = payload
        .get("resolved_date")
        .and_then(Value::as_str)
        .and_then(parse_iso_date);
    let rows = rows_from_payload(payload);

    // Without an envelope the effective day comes from the first raw row.
    let resolved_date = envelope_date.or_else(|| {
        rows.first()
            .and_then(|row| pick_string(row, &["aggregation_date", "metric_date", "date"]))
            .as_deref()
            .and_then(parse_iso_date)
    });

    let records = ranking::reconcile(&rows);
    info!(
        "daily ranking: {} raw rows -> {} entities (date {:?})",
        rows.len(),
        records.len(),
        resolved_date
    );
    Ok(RankingDay { resolved_date, records })
}

/// One row of an entity's fetched series. `value` keeps the missing/zero
/// distinction; the aligner consumes only rows where a value is present.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub volume: Option<f64>,
    pub sentiment: Option<f64>,
    pub rank_position: Option<u32>,
}

/// Resolved series plus the diagnostics a proxy layer would emit as
/// response headers: which id, which match strategy, which collection and
/// column pair.
#[derive(Debug, Clone)]
pub struct EntitySeries {
    pub entity_id: String,
    pub matched_by: MatchStrategy,
    pub shape: SeriesShape,
    pub entries: Vec<SeriesEntry>,
}

impl EntitySeries {
    /// The dated points with a present value, ready for alignment.
    pub fn points(&self) -> Vec<SeriesPoint> {
        self.entries
            .iter()
            .filter_map(|e| e.value.map(|value| SeriesPoint { date: e.date, value }))
            .collect()
    }
}

/// Resolve `name` to an identity, the identity to a series shape, and
/// fetch up to `limit_days` points ascending by date.
pub fn entity_series(
    store: &dyn Store,
    name: &str,
    limit_days: Option<u32>,
) -> Result<EntitySeries, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::MissingParam("entity"));
    }

    let ResolvedIdentity { id, matched_by, .. } = resolver::resolve_entity_id(store, name)
        .ok_or_else(|| ApiError::EntityNotFound { entity: name.to_string() })?;
    let shape = resolver::resolve_series_shape(store, &id)?;

    let query = vec![
        eq(ENTITY_COLUMN, &id),
        order_asc(shape.date_column),
        limit(limit_days.unwrap_or(DEFAULT_SERIES_DAYS)),
    ];
    let rows = store.fetch_rows(shape.collection, &query)?;

    let entries = rows
        .iter()
        .filter_map(|row| {
            let date = pick_string(row, &[shape.date_column])
                .as_deref()
                .and_then(parse_iso_date)?;
            Some(SeriesEntry {
                date,
                value: row.get(shape.score_column).and_then(parse_score),
                volume: pick_number(row, &["volume_total", "volume"]),
                sentiment: pick_number(row, &["sentiment_score", "sentiment"]),
                rank_position: pick_number(row, &["rank_position", "rank"])
                    .filter(|v| *v >= 1.0 && v.fract() == 0.0)
                    .map(|v| v as u32),
            })
        })
        .collect();

    info!(
        "series for {name:?}: id {id} via {}, shape {}.{}/{}",
        matched_by.as_str(),
        shape.collection,
        shape.date_column,
        shape.score_column
    );
    Ok(EntitySeries { entity_id: id, matched_by, shape, entries })
}

/// `{id, label}` feed for comparison pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOption {
    pub id: String,
    pub label: String,
}

pub fn list_entities(store: &dyn Store) -> Result<Vec<EntityOption>, ApiError> {
    let query = vec![select("id,name_short,name_official"), order_asc("name_short")];
    let rows = store.fetch_rows("clubs", &query)?;
    let mut options: Vec<EntityOption> = rows
        .iter()
        .filter_map(|row| {
            let id = pick_string(row, &["id"])?;
            let label = pick_string(row, &["name_short", "name_official"])?;
            Some(EntityOption { id, label })
        })
        .collect();
    options.sort_by(|a, b| a.label.cmp(&b.label));
    options.dedup_by(|a, b| a.id == b.id);
    Ok(options)
}

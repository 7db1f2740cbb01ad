use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::pick_string;
use crate::store::{Store, eq, ilike, limit, select};

/// Primary entities collection and its two name columns.
const ENTITIES_COLLECTION: &str = "clubs";
/// Denormalized ranking view that embeds a display name directly; last
/// resort when the entities collection does not know the clicked name.
const RANKING_VIEW: &str = "daily_ranking_with_names";

/// Backend collections that may hold an entity's daily series, in probe
/// priority order. The effective schema differs across environments and
/// migrations, so this is data, not control flow.
pub const SERIES_COLLECTIONS: &[&str] = &[
    "daily_ranking",
    "daily_iap_ranking",
    "daily_iap",
    "daily_aggregations_v2",
    "time_bucket_metrics",
];
pub const DATE_COLUMNS: &[&str] = &["aggregation_date", "metric_date", "date"];
pub const SCORE_COLUMNS: &[&str] = &["score", "iap", "iap_score", "value"];
pub const ENTITY_COLUMN: &str = "club_id";

/// Which probe strategy produced the identity match. Serializes to the
/// diagnostic header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    ShortNameEq,
    OfficialNameEq,
    ShortNameFold,
    OfficialNameFold,
    RankingViewName,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::ShortNameEq => "clubs.name_short=eq",
            MatchStrategy::OfficialNameEq => "clubs.name_official=eq",
            MatchStrategy::ShortNameFold => "clubs.name_short=ilike",
            MatchStrategy::OfficialNameFold => "clubs.name_official=ilike",
            MatchStrategy::RankingViewName => "daily_ranking_with_names.club_name",
        }
    }
}

struct IdentityProbe {
    strategy: MatchStrategy,
    column: &'static str,
    fold: bool,
}

/// Probes against the entities collection, tried in order before the
/// ranking-view fallback.
const IDENTITY_PROBES: &[IdentityProbe] = &[
    IdentityProbe { strategy: MatchStrategy::ShortNameEq, column: "name_short", fold: false },
    IdentityProbe { strategy: MatchStrategy::OfficialNameEq, column: "name_official", fold: false },
    IdentityProbe { strategy: MatchStrategy::ShortNameFold, column: "name_short", fold: true },
    IdentityProbe { strategy: MatchStrategy::OfficialNameFold, column: "name_official", fold: true },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub id: String,
    pub matched_by: MatchStrategy,
    pub official_name: Option<String>,
    pub short_name: Option<String>,
}

/// Resolve a human-entered entity name to its stored id.
///
/// Strategies run in a fixed order; the first one returning at least one
/// row wins. Ties within a strategy break on lexicographically smallest id
/// so the result never depends on store-side row order. A failing probe is
/// logged and skipped; exhausting every strategy is `None` — not-found is
/// an expected condition, never a hard error.
pub fn resolve_entity_id(store: &dyn Store, name: &str) -> Option<ResolvedIdentity> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    for probe in IDENTITY_PROBES {
        let filter = if probe.fold {
            ilike(probe.column, name)
        } else {
            eq(probe.column, name)
        };
        let filters = vec![select("id,name_official,name_short"), filter];

        let rows = match store.fetch_rows(ENTITIES_COLLECTION, &filters) {
            Ok(rows) => rows,
            Err(err) => {
                warn!("identity probe {} failed: {err}", probe.strategy.as_str());
                continue;
            }
        };

        if let Some(row) = smallest_by_id(&rows, "id") {
            let id = pick_string(row, &["id"])?;
            debug!("resolved {name:?} via {}", probe.strategy.as_str());
            return Some(ResolvedIdentity {
                id,
                matched_by: probe.strategy,
                official_name: pick_string(row, &["name_official"]),
                short_name: pick_string(row, &["name_short"]),
            });
        }
    }

    // Fallback: the ranking view carries display names directly, which
    // covers names that never made it into the entities collection.
    let filters = vec![select("club_id,club_name"), eq("club_name", name)];
    match store.fetch_rows(RANKING_VIEW, &filters) {
        Ok(rows) => {
            let row = smallest_by_id(&rows, "club_id")?;
            let id = pick_string(row, &["club_id"])?;
            debug!("resolved {name:?} via {}", MatchStrategy::RankingViewName.as_str());
            Some(ResolvedIdentity {
                id,
                matched_by: MatchStrategy::RankingViewName,
                official_name: None,
                short_name: None,
            })
        }
        Err(err) => {
            warn!(
                "identity probe {} failed: {err}",
                MatchStrategy::RankingViewName.as_str()
            );
            None
        }
    }
}

fn smallest_by_id<'a>(rows: &'a [Value], id_column: &str) -> Option<&'a Value> {
    rows.iter()
        .filter(|row| pick_string(row, &[id_column]).is_some())
        .min_by_key(|row| pick_string(row, &[id_column]))
}

/// Where an entity's series lives: which collection, and which columns
/// hold the date and the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesShape {
    pub collection: &'static str,
    pub date_column: &'static str,
    pub score_column: &'static str,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "no candidate collection exposes a date and score column for this entity (tried: {})",
        attempted.join(", ")
    )]
    SchemaMismatch { attempted: Vec<String> },
}

/// Determine which collection and column pair holds the series for
/// `entity_id` by sampling one row per candidate collection.
///
/// Collections with no sample row for the entity are skipped silently;
/// failing probes are skipped with a warning. Exhaustion is a schema
/// mismatch carrying every attempted collection — an empty series must
/// never mask a broken mapping.
pub fn resolve_series_shape(
    store: &dyn Store,
    entity_id: &str,
) -> Result<SeriesShape, ResolveError> {
    let mut attempted: Vec<String> = Vec::new();

    for &collection in SERIES_COLLECTIONS {
        attempted.push(collection.to_string());

        let filters = vec![eq(ENTITY_COLUMN, entity_id), limit(1)];
        let rows = match store.fetch_rows(collection, &filters) {
            Ok(rows) => rows,
            Err(err) => {
                warn!("series shape probe on {collection} failed: {err}");
                continue;
            }
        };
        let Some(sample) = rows.first() else { continue };

        let date_column = DATE_COLUMNS.iter().copied().find(|c| has_value(sample, c));
        let score_column = SCORE_COLUMNS.iter().copied().find(|c| has_value(sample, c));

        if let (Some(date_column), Some(score_column)) = (date_column, score_column) {
            debug!("series shape for {entity_id}: {collection}.{date_column}/{score_column}");
            return Ok(SeriesShape { collection, date_column, score_column });
        }
    }

    Err(ResolveError::SchemaMismatch { attempted })
}

fn has_value(row: &Value, column: &str) -> bool {
    row.get(column).is_some_and(|v| !v.is_null())
}

use std::fs;
use std::path::PathBuf;

use serde_json::json;

use pulse_rank::api::{self, ApiError, RankingFilters};
use pulse_rank::fake_store::FakeStore;
use pulse_rank::resolver::MatchStrategy;
use pulse_rank::series::parse_iso_date;

fn read_fixture(name: &str) -> serde_json::Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

#[test]
fn daily_ranking_reconciles_messy_envelope_rows() {
    let store =
        FakeStore::new().with_payload("daily_ranking", read_fixture("daily_ranking_messy.json"));

    let day = api::daily_ranking(&store, &RankingFilters::default()).expect("should succeed");
    assert_eq!(day.resolved_date, parse_iso_date("2024-03-15"));

    // Duplicate Vasco rows collapse, the anonymous and malformed rows are
    // dropped, the two Remo spellings merge by normalized name.
    let names: Vec<&str> = day.records.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, ["Vasco", "SPFC", "remo", "Bahia"]);

    let ranks: Vec<u32> = day.records.iter().map(|r| r.rank_position).collect();
    assert_eq!(ranks, [1, 2, 3, 4]);

    let vasco = &day.records[0];
    assert_eq!(vasco.score, Some(41.25));
    assert_eq!(vasco.volume, Some(1800.0));
    assert_eq!(vasco.sentiment, Some(0.62));

    // Bahia has no score but stays in the ranking, positionally last.
    assert_eq!(day.records[3].score, None);
}

#[test]
fn daily_ranking_reads_date_from_first_row_without_envelope() {
    let store = FakeStore::new().with_rows(
        "daily_ranking",
        vec![json!({ "club_name": "Vasco", "score": 1, "aggregation_date": "2024-02-02" })],
    );
    let day = api::daily_ranking(&store, &RankingFilters::default()).expect("should succeed");
    assert_eq!(day.resolved_date, parse_iso_date("2024-02-02"));
}

#[test]
fn entity_series_end_to_end_with_diagnostics() {
    let store = FakeStore::new()
        .with_rows(
            "clubs",
            vec![json!({ "id": "c-vasco", "name_short": "Vasco", "name_official": "CR Vasco da Gama" })],
        )
        .with_rows(
            "daily_ranking",
            vec![
                json!({
                    "club_id": "c-vasco",
                    "aggregation_date": "2024-03-14",
                    "score": "10,5",
                    "volume_total": 500,
                    "rank_position": 3
                }),
                json!({
                    "club_id": "c-vasco",
                    "aggregation_date": "2024-03-15",
                    "score": 12.0
                }),
                json!({
                    "club_id": "c-other",
                    "aggregation_date": "2024-03-15",
                    "score": 50.0
                }),
            ],
        );

    let series = api::entity_series(&store, "Vasco", Some(30)).expect("should succeed");
    assert_eq!(series.entity_id, "c-vasco");
    assert_eq!(series.matched_by, MatchStrategy::ShortNameEq);
    assert_eq!(series.shape.collection, "daily_ranking");
    assert_eq!(series.shape.date_column, "aggregation_date");
    assert_eq!(series.shape.score_column, "score");

    assert_eq!(series.entries.len(), 2);
    assert_eq!(series.entries[0].value, Some(10.5));
    assert_eq!(series.entries[0].volume, Some(500.0));
    assert_eq!(series.entries[0].rank_position, Some(3));

    let points = series.points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].value, 12.0);
}

#[test]
fn missing_entity_param_is_a_400() {
    let store = FakeStore::new();
    let err = api::entity_series(&store, "   ", None).expect_err("should fail");
    assert!(matches!(err, ApiError::MissingParam("entity")));
    assert_eq!(err.status(), 400);
}

#[test]
fn unresolvable_name_is_a_404_with_the_attempted_name() {
    let store = FakeStore::new();
    let err = api::entity_series(&store, "Ghost FC", None).expect_err("should fail");
    match &err {
        ApiError::EntityNotFound { entity } => assert_eq!(entity, "Ghost FC"),
        other => panic!("expected EntityNotFound, got {other:?}"),
    }
    assert_eq!(err.status(), 404);
}

#[test]
fn resolved_identity_without_series_is_a_500_schema_mismatch() {
    // The id resolves but no candidate collection has a row for it; that
    // must fail loudly instead of returning an empty series.
    let store = FakeStore::new().with_rows(
        "clubs",
        vec![json!({ "id": "c1", "name_short": "Vasco", "name_official": "CR Vasco da Gama" })],
    );
    let err = api::entity_series(&store, "Vasco", None).expect_err("should fail");
    assert!(matches!(err, ApiError::Schema(_)));
    assert_eq!(err.status(), 500);
}

#[test]
fn list_entities_builds_picker_options() {
    let store = FakeStore::new().with_rows(
        "clubs",
        vec![
            json!({ "id": "c2", "name_short": "Remo" }),
            json!({ "id": "c1", "name_official": "CR Vasco da Gama" }),
            json!({ "no_id": true }),
        ],
    );
    let options = api::list_entities(&store).expect("should succeed");
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].label, "CR Vasco da Gama");
    assert_eq!(options[1].label, "Remo");
}

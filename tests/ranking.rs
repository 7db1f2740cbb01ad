use pulse_rank::normalize::NormalizedRow;
use pulse_rank::ranking::{CanonicalRecord, aggregate, assign_ranks};

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

fn rank_of<'a>(records: &'a [CanonicalRecord], name: &str) -> &'a CanonicalRecord {
    records
        .iter()
        .find(|r| r.display_name == name)
        .unwrap_or_else(|| panic!("{name} should be present"))
}

#[test]
fn competition_ranking_shares_rank_on_ties() {
    let rows = vec![
        row("A", Some(50.0)),
        row("B", Some(80.0)),
        row("C", Some(80.0)),
        row("D", Some(30.0)),
    ];
    let ranked = assign_ranks(aggregate(&rows));

    assert_eq!(rank_of(&ranked, "A").rank_position, 3);
    assert_eq!(rank_of(&ranked, "B").rank_position, 1);
    assert_eq!(rank_of(&ranked, "C").rank_position, 1);
    // D takes its ordinal position, not rank+1.
    assert_eq!(rank_of(&ranked, "D").rank_position, 4);
}

#[test]
fn missing_scores_sort_last_in_original_relative_order() {
    let rows = vec![
        row("n1", None),
        row("ten", Some(10.0)),
        row("n2", None),
        row("twenty", Some(20.0)),
    ];
    let ranked = assign_ranks(aggregate(&rows));

    let names: Vec<&str> = ranked.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, ["twenty", "ten", "n1", "n2"]);
    let ranks: Vec<u32> = ranked.iter().map(|r| r.rank_position).collect();
    assert_eq!(ranks, [1, 2, 3, 4]);
}

#[test]
fn merge_prefers_present_then_higher_score() {
    let rows = vec![row("Vasco", None), row("Vasco", Some(42.0))];
    let merged = aggregate(&rows);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].score, Some(42.0));

    let rows = vec![row("Remo", Some(10.0)), row("Remo", Some(15.0))];
    let merged = aggregate(&rows);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].score, Some(15.0));

    // Never summed or averaged.
    let rows = vec![row("Bahia", Some(15.0)), row("Bahia", Some(10.0))];
    assert_eq!(aggregate(&rows)[0].score, Some(15.0));
}

#[test]
fn aggregation_is_idempotent() {
    let rows = vec![
        row("A", Some(50.0)),
        row("B", None),
        row("A", Some(70.0)),
        row("C", Some(70.0)),
        row("B", Some(1.0)),
    ];
    let once = aggregate(&rows);

    let as_rows: Vec<NormalizedRow> = once
        .iter()
        .map(|r| NormalizedRow {
            entity_id: Some(r.entity_id.clone()),
            display_name: r.display_name.clone(),
            score: r.score,
            volume: r.volume,
            sentiment: r.sentiment,
            rank: None,
        })
        .collect();
    let twice = aggregate(&as_rows);

    assert_eq!(once.len(), twice.len());
    for (a, b) in once.iter().zip(twice.iter()) {
        assert_eq!(a.display_name, b.display_name);
        assert_eq!(a.score, b.score);
    }
}

#[test]
fn ranking_same_input_is_deterministic() {
    let rows = vec![
        row("A", Some(5.0)),
        row("B", Some(5.0)),
        row("C", None),
        row("D", Some(9.0)),
    ];
    let first = assign_ranks(aggregate(&rows));
    let second = assign_ranks(aggregate(&rows));
    assert_eq!(first, second);
}

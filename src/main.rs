use std::env;
use std::process::ExitCode;

use chrono::NaiveDate;
use log::warn;

use pulse_rank::ab_summary::build_ab_summary;
use pulse_rank::api::{self, ApiError, RankingFilters};
use pulse_rank::normalize::display_score;
use pulse_rank::series::{align, parse_iso_date};
use pulse_rank::session::{self, Fetched, RequestSlot};
use pulse_rank::store::RestStore;
use pulse_rank::trend::{Trend, compute_trend, top_movers};

struct CliArgs {
    date: Option<NaiveDate>,
    topic: Option<String>,
    top: usize,
    compare_date: Option<NaiveDate>,
    plot: Vec<String>,
}

fn parse_args() -> Result<CliArgs, String> {
    let mut args = CliArgs {
        date: None,
        topic: None,
        top: 20,
        compare_date: None,
        plot: Vec::new(),
    };

    let mut it = env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = |name: &str| it.next().ok_or_else(|| format!("{name} expects a value"));
        match flag.as_str() {
            "--date" => {
                let raw = value("--date")?;
                args.date = Some(parse_iso_date(&raw).ok_or_else(|| format!("bad date: {raw}"))?);
            }
            "--topic" => args.topic = Some(value("--topic")?),
            "--top" => {
                let raw = value("--top")?;
                args.top = raw.parse().map_err(|_| format!("bad --top value: {raw}"))?;
            }
            "--compare" => {
                let raw = value("--compare")?;
                args.compare_date =
                    Some(parse_iso_date(&raw).ok_or_else(|| format!("bad date: {raw}"))?);
            }
            "--plot" => {
                let raw = value("--plot")?;
                args.plot = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            other => return Err(format!("unknown flag: {other}")),
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!(
                "usage: pulse_rank [--date YYYY-MM-DD] [--topic NAME] [--top N] \
                 [--compare YYYY-MM-DD] [--plot name,name,...]"
            );
            return ExitCode::FAILURE;
        }
    };

    let store = match RestStore::from_env() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&store, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error ({}): {err}", err.status());
            ExitCode::FAILURE
        }
    }
}

fn run(store: &RestStore, args: &CliArgs) -> Result<(), ApiError> {
    let filters = RankingFilters {
        date: args.date,
        topic: args.topic.clone(),
        limit: Some(args.top.max(1) as u32),
    };
    let day = api::daily_ranking(store, &filters)?;

    let effective_date = day.resolved_date.or(args.date);
    if let (Some(requested), Some(resolved)) = (args.date, day.resolved_date) {
        if requested != resolved {
            println!("requested {requested}, store resolved to {resolved}");
        }
    }

    // One request slot per purpose; a rerun with a new date would cancel
    // this token before issuing the next fetch.
    let mut prev_slot = RequestSlot::new();
    let snapshot = match effective_date {
        Some(date) => {
            let token = prev_slot.begin();
            match session::fetch_prev_snapshot(store, date, args.topic.as_deref(), &token) {
                Ok(Fetched::Complete(snapshot)) if !snapshot.is_empty() => Some(snapshot),
                Ok(_) => None,
                Err(err) => {
                    warn!("previous-day fetch failed: {err}");
                    None
                }
            }
        }
        None => None,
    };

    println!(
        "ranking for {}",
        effective_date.map_or_else(|| "latest day".to_string(), |d| d.to_string())
    );
    for record in &day.records {
        let trend = match compute_trend(record, snapshot.as_ref()) {
            Some(Trend { rank_delta: 0, .. }) => "=".to_string(),
            Some(Trend { rank_delta, .. }) if rank_delta > 0 => format!("▲{rank_delta}"),
            Some(Trend { rank_delta, .. }) => format!("▼{}", -rank_delta),
            None => "—".to_string(),
        };
        println!(
            "{:>3}. {:<24} {:>10.2} {}",
            record.rank_position,
            record.display_name,
            display_score(record.score),
            trend
        );
    }

    if let Some(snapshot) = &snapshot {
        let (up, down) = top_movers(&day.records, Some(snapshot), 3);
        if !up.is_empty() || !down.is_empty() {
            println!("\ntop movers vs {}:", snapshot.date);
            for m in up {
                println!("  ▲{} {}", m.rank_delta, m.display_name);
            }
            for m in down {
                println!("  ▼{} {}", -m.rank_delta, m.display_name);
            }
        }
    }

    if let Some(date_b) = args.compare_date {
        let day_b = api::daily_ranking(
            store,
            &RankingFilters {
                date: Some(date_b),
                topic: args.topic.clone(),
                limit: Some(args.top.max(1) as u32),
            },
        )?;
        let top_a: Vec<_> = day.records.iter().take(args.top).cloned().collect();
        let top_b: Vec<_> = day_b.records.iter().take(args.top).cloned().collect();
        let summary = build_ab_summary(&top_a, &top_b);

        println!("\nA/B top-{} vs {date_b}:", args.top);
        println!("  entered: {}", summary.entered.join(", "));
        println!("  exited:  {}", summary.exited.join(", "));
        if let Some((name, delta)) = &summary.best_up {
            println!("  best up:   {name} ({delta:+.2})");
        }
        if let Some((name, delta)) = &summary.best_down {
            println!("  best down: {name} ({delta:+.2})");
        }
    }

    if !args.plot.is_empty() {
        let mut batch_slot = RequestSlot::new();
        let token = batch_slot.begin();
        match session::fetch_compare_batch(store, &args.plot, None, &token)? {
            Fetched::Cancelled => {}
            Fetched::Complete(series) => {
                let aligned = align(&series);
                println!("\naligned series ({} days):", aligned.labels.len());
                for (name, s) in &aligned.series {
                    let row: Vec<String> = s
                        .values
                        .iter()
                        .map(|v| v.map_or_else(|| "·".to_string(), |x| format!("{x:.1}")))
                        .collect();
                    println!(
                        "  {:<20} {}{}",
                        name,
                        row.join(" "),
                        if s.has_gaps { "  (gaps)" } else { "" }
                    );
                }
            }
        }
    }

    Ok(())
}

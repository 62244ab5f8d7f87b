use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use y2k_history::{config, snapshot, yahoo};

/// Snapshot-only fetcher: pulls settings and every scoreboard week for each
/// configured season into the local cache without touching the ledger. Useful
/// for warming the cache on a new machine before the first full build.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let force = args.iter().any(|a| a == "--force");
    let seasons_filter = parse_seasons_arg(&args);
    let config_path = parse_path_arg(&args, "--config")
        .unwrap_or_else(config::default_config_path);

    let league = config::load_league_config(&config_path)?;
    let snapshot_path = parse_path_arg(&args, "--snapshot")
        .or_else(snapshot::default_snapshot_path)
        .context("unable to resolve snapshot cache path")?;

    let mut store = snapshot::load_store(&snapshot_path);
    let client = yahoo::http_client()?;

    let mut seasons_ok = 0usize;
    let mut weeks_fetched = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for (&season, entry) in &league.seasons {
        if let Some(filter) = &seasons_filter
            && !filter.contains(&season)
        {
            continue;
        }

        let settings = match yahoo::fetch_season_settings(client, entry.game_id, &entry.league_id)
        {
            Ok(settings) => settings,
            Err(err) => {
                errors.push(format!("season {season}: {err:#}"));
                continue;
            }
        };

        let snap = store.season_mut(season);
        snap.settings = Some(settings);
        let Some(total_weeks) = snap.total_weeks() else {
            errors.push(format!("season {season}: week span unknown"));
            continue;
        };

        let mut season_ok = true;
        for week in 1..=total_weeks {
            match yahoo::fetch_week_matchups(client, entry.game_id, &entry.league_id, week, force)
            {
                Ok(matchups) => {
                    let count = matchups.len();
                    store.season_mut(season).weeks.insert(week, matchups);
                    weeks_fetched += 1;
                    println!("season {season} week {week}: {count} matchups");
                }
                Err(err) => {
                    season_ok = false;
                    errors.push(format!("season {season} week {week}: {err:#}"));
                }
            }
        }
        if season_ok {
            seasons_ok += 1;
        }
    }

    if seasons_ok == 0 && !errors.is_empty() {
        for err in &errors {
            println!("  - {err}");
        }
        return Err(anyhow!("every season failed to fetch"));
    }

    snapshot::save_store(&snapshot_path, &store)?;

    println!("Snapshot ingest complete");
    println!("Cache: {}", snapshot_path.display());
    println!("Seasons fetched cleanly: {seasons_ok}");
    println!("Weeks fetched: {weeks_fetched}");
    if !errors.is_empty() {
        println!("Errors: {}", errors.len());
        for err in errors.iter().take(10) {
            println!("  - {err}");
        }
    }

    Ok(())
}

fn parse_path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    let eq_prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&eq_prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn parse_seasons_arg(args: &[String]) -> Option<Vec<i32>> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--seasons=") {
            let seasons = parse_seasons(raw);
            if !seasons.is_empty() {
                return Some(seasons);
            }
        }
        if arg == "--seasons"
            && let Some(next) = args.get(idx + 1)
        {
            let seasons = parse_seasons(next);
            if !seasons.is_empty() {
                return Some(seasons);
            }
        }
    }
    None
}

fn parse_seasons(raw: &str) -> Vec<i32> {
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<i32>().ok())
        .collect()
}

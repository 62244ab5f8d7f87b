use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use y2k_history::{accolades, config, h2h, ledger, merge, site, snapshot, standings, yahoo};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let opts = Options::parse()?;

    let league = config::load_league_config(&opts.config_path)?;

    let snapshot_path = opts
        .snapshot_path
        .clone()
        .or_else(snapshot::default_snapshot_path)
        .context("unable to resolve snapshot cache path")?;
    let mut store = snapshot::load_store(&snapshot_path);

    if opts.fetch {
        let fetched = fetch_seasons(&mut store, &league, opts.force_fetch)?;
        snapshot::save_store(&snapshot_path, &store)?;
        println!(
            "Fetched {} seasons ({} weeks) into {}",
            fetched.seasons,
            fetched.weeks,
            snapshot_path.display()
        );
        for err in &fetched.errors {
            println!("  fetch error: {err}");
        }
    }

    if store.seasons.is_empty() {
        return Err(anyhow!(
            "no cached seasons in {}; run with --fetch first",
            snapshot_path.display()
        ));
    }

    let build = ledger::build_from_snapshots(&store, &league.operator);

    let db_path = opts
        .db_path
        .clone()
        .or_else(ledger::default_db_path)
        .context("unable to resolve sqlite path")?;
    let mut conn = ledger::open_db(&db_path)?;
    let upserted =
        ledger::store_ledger(&mut conn, &build.games, build.seasons_processed, &build.warnings)?;
    let games = ledger::load_ledger(&conn)?;

    let raw_h2h = h2h::rebuild(&games);
    let merged = merge::merge_identities(&raw_h2h, &league.merge);

    let h2h_path = opts
        .h2h_path
        .clone()
        .or_else(|| snapshot::app_cache_dir().map(|d| d.join("h2h.json")))
        .context("unable to resolve h2h output path")?;
    h2h::save_h2h(&h2h_path, &merged)?;

    let summaries = standings::season_summaries(&games, &league.merge);
    let all_time = standings::all_time_finishes(&summaries, &league.merge);
    let report = accolades::compute_accolades(&games, &league.merge);

    let mut pages_written = 0usize;
    if let Some(site_dir) = &opts.site_dir {
        let inputs = site::SiteInputs {
            h2h: &merged,
            summaries: &summaries,
            all_time: &all_time,
            accolades: &report,
            merge: &league.merge,
        };
        pages_written = site::render_site(site_dir, &inputs)?.len();
    }

    println!("History build complete");
    println!("DB: {}", db_path.display());
    println!(
        "Seasons: {}/{}",
        build.seasons_processed,
        store.seasons.len()
    );
    println!("Games upserted: {upserted}");
    println!("H2H pairs: {} -> {}", merged.len(), h2h_path.display());
    if let Some(site_dir) = &opts.site_dir {
        println!("Site: {pages_written} pages -> {}", site_dir.display());
    }

    if !build.warnings.is_empty() {
        println!("Warnings: {}", build.warnings.len());
        for warning in &build.warnings {
            println!("  - {warning}");
        }
    }
    if !build.season_errors.is_empty() {
        println!("Season errors: {}", build.season_errors.len());
        for err in &build.season_errors {
            println!("  - {err}");
        }
    }

    Ok(())
}

struct FetchSummary {
    seasons: usize,
    weeks: usize,
    errors: Vec<String>,
}

/// Pull settings and every scoreboard week for each configured season into the
/// snapshot store. Per-season failures are collected rather than aborting the
/// run, so one dead archive year cannot block the rest.
fn fetch_seasons(
    store: &mut snapshot::SnapshotStore,
    league: &config::LeagueConfig,
    force: bool,
) -> Result<FetchSummary> {
    let client = yahoo::http_client()?;
    let mut summary = FetchSummary {
        seasons: 0,
        weeks: 0,
        errors: Vec::new(),
    };

    for (&season, entry) in &league.seasons {
        let settings = match yahoo::fetch_season_settings(client, entry.game_id, &entry.league_id)
        {
            Ok(settings) => settings,
            Err(err) => {
                summary.errors.push(format!("season {season}: {err:#}"));
                continue;
            }
        };

        let snap = store.season_mut(season);
        snap.settings = Some(settings);
        let Some(total_weeks) = snap.total_weeks() else {
            summary
                .errors
                .push(format!("season {season}: settings present but week span unknown"));
            continue;
        };

        let mut season_ok = true;
        for week in 1..=total_weeks {
            match yahoo::fetch_week_matchups(client, entry.game_id, &entry.league_id, week, force)
            {
                Ok(matchups) => {
                    store.season_mut(season).weeks.insert(week, matchups);
                    summary.weeks += 1;
                }
                Err(err) => {
                    season_ok = false;
                    summary
                        .errors
                        .push(format!("season {season} week {week}: {err:#}"));
                }
            }
        }
        if season_ok {
            summary.seasons += 1;
        }
    }

    Ok(summary)
}

struct Options {
    config_path: PathBuf,
    snapshot_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    h2h_path: Option<PathBuf>,
    site_dir: Option<PathBuf>,
    fetch: bool,
    force_fetch: bool,
}

impl Options {
    fn parse() -> Result<Self> {
        let args = std::env::args().skip(1).collect::<Vec<_>>();
        let mut opts = Options {
            config_path: config::default_config_path(),
            snapshot_path: None,
            db_path: None,
            h2h_path: None,
            site_dir: Some(PathBuf::from("site")),
            fetch: false,
            force_fetch: false,
        };

        let mut idx = 0;
        while idx < args.len() {
            let arg = args[idx].as_str();
            match arg {
                "--fetch" => opts.fetch = true,
                "--force-fetch" => {
                    opts.fetch = true;
                    opts.force_fetch = true;
                }
                "--no-site" => opts.site_dir = None,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => {
                    if let Some(value) = flag_value(&args, &mut idx, "--config")? {
                        opts.config_path = PathBuf::from(value);
                    } else if let Some(value) = flag_value(&args, &mut idx, "--snapshot")? {
                        opts.snapshot_path = Some(PathBuf::from(value));
                    } else if let Some(value) = flag_value(&args, &mut idx, "--db")? {
                        opts.db_path = Some(PathBuf::from(value));
                    } else if let Some(value) = flag_value(&args, &mut idx, "--h2h")? {
                        opts.h2h_path = Some(PathBuf::from(value));
                    } else if let Some(value) = flag_value(&args, &mut idx, "--site")? {
                        opts.site_dir = Some(PathBuf::from(value));
                    } else {
                        return Err(anyhow!("unknown argument: {arg}"));
                    }
                }
            }
            idx += 1;
        }

        Ok(opts)
    }
}

/// Accepts both `--flag value` and `--flag=value`. Advances `idx` past a
/// consumed separate value.
fn flag_value<'a>(args: &'a [String], idx: &mut usize, name: &str) -> Result<Option<&'a str>> {
    let arg = args[*idx].as_str();
    if let Some(rest) = arg.strip_prefix(name) {
        if let Some(value) = rest.strip_prefix('=') {
            if value.trim().is_empty() {
                return Err(anyhow!("empty value for {name}"));
            }
            return Ok(Some(value));
        }
        if rest.is_empty() {
            let Some(next) = args.get(*idx + 1) else {
                return Err(anyhow!("missing value for {name}"));
            };
            *idx += 1;
            return Ok(Some(next));
        }
    }
    Ok(None)
}

fn print_usage() {
    println!("usage: y2k_history [options]");
    println!("  --fetch            refresh season snapshots from the fantasy API");
    println!("  --force-fetch      refetch even weeks already in the body cache");
    println!("  --config <path>    league config json (default: leagues.json)");
    println!("  --snapshot <path>  snapshot cache file");
    println!("  --db <path>        sqlite ledger path");
    println!("  --h2h <path>       head-to-head json output path");
    println!("  --site <dir>       static site output dir (default: site)");
    println!("  --no-site          skip site rendering");
}

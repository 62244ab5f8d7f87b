use std::collections::HashMap;
use std::fs;

use y2k_history::accolades::compute_accolades;
use y2k_history::config::MergeConfig;
use y2k_history::h2h;
use y2k_history::ledger::{self, pair_key, BuildWarning};
use y2k_history::merge::merge_identities;
use y2k_history::site::{render_site, SiteInputs};
use y2k_history::snapshot::{
    LeagueSeasonSettings, RawManager, RawMatchup, RawTeamSide, SnapshotStore,
};
use y2k_history::standings::{all_time_finishes, season_summaries};

fn side(manager: &str, points: f64) -> RawTeamSide {
    RawTeamSide {
        team_key: format!("461.l.1.t.{manager}"),
        managers: vec![RawManager {
            nickname: manager.to_string(),
        }],
        points,
    }
}

fn game(a: &str, pa: f64, b: &str, pb: f64, playoffs: bool) -> RawMatchup {
    RawMatchup {
        team1: side(a, pa),
        team2: side(b, pb),
        is_tied: false,
        winner_team_key: Some(format!("461.l.1.t.{}", if pa > pb { a } else { b })),
        is_playoffs: playoffs,
        is_consolation: false,
    }
}

/// One complete four-team season plus one season with no cached settings.
fn sample_store() -> SnapshotStore {
    let mut store = SnapshotStore::default();

    let snap = store.season_mut(2014);
    snap.settings = Some(LeagueSeasonSettings {
        playoff_start_week: 2,
        num_playoff_teams: 4,
    });
    snap.weeks.insert(
        1,
        vec![
            game("Ann", 100.0, "Ben", 90.0, false),
            game("Cal", 95.0, "Dee", 85.0, false),
        ],
    );
    snap.weeks.insert(
        2,
        vec![
            game("Ann", 105.0, "Cal", 99.0, true),
            game("Dee", 92.0, "Ben", 88.0, true),
        ],
    );
    snap.weeks.insert(
        3,
        vec![
            game("Ann", 120.0, "Dee", 100.0, true),
            game("Cal", 95.0, "Ben", 90.0, true),
        ],
    );

    // Settings never fetched; the build should warn and skip.
    store.season_mut(2013);
    store
}

#[test]
fn build_stores_and_reloads_through_sqlite() {
    let store = sample_store();
    let build = ledger::build_from_snapshots(&store, "Dylan");

    assert_eq!(build.seasons_processed, 1);
    assert!(build.season_errors.is_empty());
    assert!(build
        .warnings
        .contains(&BuildWarning::MissingSeasonData { season: 2013 }));
    assert_eq!(build.games.len(), 6);

    let db_path = std::env::temp_dir().join(format!(
        "y2k_pipeline_test_{}.sqlite",
        std::process::id()
    ));
    let _ = fs::remove_file(&db_path);

    let mut conn = ledger::open_db(&db_path).unwrap();
    let upserted =
        ledger::store_ledger(&mut conn, &build.games, build.seasons_processed, &build.warnings)
            .unwrap();
    assert_eq!(upserted, 6);

    let reloaded = ledger::load_ledger(&conn).unwrap();
    assert_eq!(reloaded, build.games);

    drop(conn);
    let _ = fs::remove_file(&db_path);
}

#[test]
fn derived_outputs_agree_with_the_ledger() {
    let store = sample_store();
    let build = ledger::build_from_snapshots(&store, "Dylan");
    let merge = MergeConfig::default();

    let h2h_store = merge_identities(&h2h::rebuild(&build.games), &merge);
    // Ann swept Cal: regular week 1 never happened between them, but the
    // semifinal and final did.
    let ann_cal = &h2h_store[&pair_key("Ann", "Cal")];
    assert_eq!(ann_cal.playoff_wins_for("Ann"), 2);
    assert_eq!(ann_cal.playoff_wins_for("Cal"), 0);

    let summaries = season_summaries(&build.games, &merge);
    assert_eq!(summaries.len(), 1);
    let ranks = &summaries[0].final_ranks;
    assert_eq!(ranks["Ann"], 1);
    assert_eq!(ranks["Dee"], 2);
    assert_eq!(ranks["Cal"], 3);
    assert_eq!(ranks["Ben"], 4);

    let all_time = all_time_finishes(&summaries, &merge);
    assert_eq!(all_time[0].manager, "Ann");
    assert_eq!(all_time[0].avg_finish, 1.0);

    let report = compute_accolades(&build.games, &merge);
    // Only week 1 is regular season; Ann topped it at 100.
    let ann = report
        .tallies
        .iter()
        .find(|t| t.manager == "Ann")
        .unwrap();
    assert_eq!(ann.top_points, 1);
    assert_eq!(
        report.records.top_points.as_ref().map(|e| e.value),
        Some(100.0)
    );
}

#[test]
fn site_renders_every_page() {
    let store = sample_store();
    let build = ledger::build_from_snapshots(&store, "Dylan");
    let merge = MergeConfig::default();

    let h2h_store = merge_identities(&h2h::rebuild(&build.games), &merge);
    let summaries = season_summaries(&build.games, &merge);
    let all_time = all_time_finishes(&summaries, &merge);
    let report = compute_accolades(&build.games, &merge);

    let out_dir = std::env::temp_dir().join(format!("y2k_site_test_{}", std::process::id()));
    let _ = fs::remove_dir_all(&out_dir);

    let inputs = SiteInputs {
        h2h: &h2h_store,
        summaries: &summaries,
        all_time: &all_time,
        accolades: &report,
        merge: &merge,
    };
    let pages = render_site(&out_dir, &inputs).unwrap();
    assert_eq!(pages.len(), 5);

    let index = fs::read_to_string(out_dir.join("index.html")).unwrap();
    assert!(index.contains("Ann"));
    let standings = fs::read_to_string(out_dir.join("standings.html")).unwrap();
    assert!(standings.contains("1st (2014)"));

    let _ = fs::remove_dir_all(&out_dir);
}

#[test]
fn hidden_managers_are_scrubbed_from_derived_outputs() {
    let store = sample_store();
    let build = ledger::build_from_snapshots(&store, "Dylan");
    let merge = MergeConfig {
        aliases: HashMap::new(),
        hidden_managers: vec!["Ben".to_string()],
        hidden_seasons: Vec::new(),
    };

    let summaries = season_summaries(&build.games, &merge);
    let all_time = all_time_finishes(&summaries, &merge);
    assert!(all_time.iter().all(|f| f.manager != "Ben"));

    let report = compute_accolades(&build.games, &merge);
    assert!(report.tallies.iter().all(|t| t.manager != "Ben"));
    // Ben had the week's highest-scoring loss; hidden means no record holder
    // rather than a leaked name.
    assert!(report.records.highest_scoring_loss.is_none());
}

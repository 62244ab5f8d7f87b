use y2k_history::h2h::{rebuild, update_with_games, GameDate, H2hStore};
use y2k_history::ledger::{pair_key, GameRecord, GameType};

fn played(
    season: i32,
    week: u32,
    game_type: GameType,
    winner: &str,
    loser: &str,
    ws: f64,
    ls: f64,
) -> GameRecord {
    GameRecord {
        season,
        week,
        game_type,
        team1_manager: winner.to_string(),
        team2_manager: loser.to_string(),
        team1_score: ws,
        team2_score: ls,
        winner_manager: Some(winner.to_string()),
    }
}

fn tied(season: i32, week: u32, a: &str, b: &str, score: f64) -> GameRecord {
    GameRecord {
        season,
        week,
        game_type: GameType::Regular,
        team1_manager: a.to_string(),
        team2_manager: b.to_string(),
        team1_score: score,
        team2_score: score,
        winner_manager: None,
    }
}

/// Mike vs Jasper over three seasons, interleaved with an unrelated pair so
/// grouping is exercised: W W L W W W for Mike in the shared games.
fn sample_ledger() -> Vec<GameRecord> {
    vec![
        played(2010, 1, GameType::Regular, "Mike", "Jasper", 101.0, 88.0),
        played(2010, 2, GameType::Regular, "Tony", "Mike", 90.0, 80.0),
        played(2010, 5, GameType::Regular, "Mike", "Jasper", 95.0, 94.0),
        played(2010, 9, GameType::Regular, "Jasper", "Mike", 120.0, 70.0),
        played(2011, 3, GameType::Regular, "Mike", "Jasper", 99.0, 98.0),
        played(2011, 8, GameType::Regular, "Mike", "Jasper", 102.0, 100.0),
        played(2011, 15, GameType::Semifinal, "Mike", "Jasper", 130.0, 110.0),
        played(2012, 4, GameType::Regular, "Tony", "Jasper", 85.0, 84.0),
    ]
}

#[test]
fn rebuild_splits_regular_and_playoff_wins() {
    let store = rebuild(&sample_ledger());
    let record = &store[&pair_key("Mike", "Jasper")];

    assert_eq!(record.regular_wins_for("Mike"), 4);
    assert_eq!(record.regular_wins_for("Jasper"), 1);
    assert_eq!(record.playoff_wins_for("Mike"), 1);
    assert_eq!(record.playoff_wins_for("Jasper"), 0);
    assert_eq!(record.regular_history.len(), 5);
    assert_eq!(record.playoff_history.len(), 1);
    assert_eq!(
        record.last_game,
        GameDate {
            season: 2011,
            week: 15
        }
    );
}

#[test]
fn longest_streak_only_replaced_when_strictly_longer() {
    let store = rebuild(&sample_ledger());
    let record = &store[&pair_key("Mike", "Jasper")];

    // Mike's closing run of three beats his opening run of two.
    assert_eq!(record.longest_streak_holder.as_deref(), Some("Mike"));
    assert_eq!(record.longest_streak_len, 3);
    assert_eq!(
        record.longest_streak_start,
        Some(GameDate {
            season: 2011,
            week: 3
        })
    );
    assert_eq!(
        record.longest_streak_end,
        Some(GameDate {
            season: 2011,
            week: 15
        })
    );
    assert_eq!(record.current_streak_holder.as_deref(), Some("Mike"));
    assert_eq!(record.current_streak_len, 3);
}

#[test]
fn equal_length_later_run_keeps_the_first() {
    let ledger = vec![
        played(2010, 1, GameType::Regular, "Ann", "Ben", 100.0, 90.0),
        played(2010, 2, GameType::Regular, "Ann", "Ben", 100.0, 90.0),
        played(2010, 3, GameType::Regular, "Ben", "Ann", 100.0, 90.0),
        played(2010, 4, GameType::Regular, "Ben", "Ann", 100.0, 90.0),
    ];
    let record = &rebuild(&ledger)[&pair_key("Ann", "Ben")];
    assert_eq!(record.longest_streak_holder.as_deref(), Some("Ann"));
    assert_eq!(record.longest_streak_len, 2);
    // The active streak is Ben's even though the record streak stays Ann's.
    assert_eq!(record.current_streak_holder.as_deref(), Some("Ben"));
    assert_eq!(record.current_streak_len, 2);
}

#[test]
fn tie_resets_the_active_streak_and_counts_nothing() {
    let ledger = vec![
        played(2010, 1, GameType::Regular, "Ann", "Ben", 100.0, 90.0),
        played(2010, 2, GameType::Regular, "Ann", "Ben", 100.0, 90.0),
        tied(2010, 3, "Ann", "Ben", 100.0),
        played(2010, 4, GameType::Regular, "Ann", "Ben", 100.0, 90.0),
    ];
    let record = &rebuild(&ledger)[&pair_key("Ann", "Ben")];

    // The tie is not a win for anyone and appears in no history.
    assert_eq!(record.regular_wins_for("Ann"), 3);
    assert_eq!(record.regular_wins_for("Ben"), 0);
    assert_eq!(record.regular_history.len(), 3);

    // The streak restarts after the tie.
    assert_eq!(record.current_streak_len, 1);
    assert_eq!(record.longest_streak_len, 2);
    assert_eq!(
        record.last_game,
        GameDate {
            season: 2010,
            week: 4
        }
    );
}

#[test]
fn consolation_games_touch_nothing() {
    let ledger = vec![
        played(2010, 1, GameType::Regular, "Ann", "Ben", 100.0, 90.0),
        played(2010, 15, GameType::Consolation, "Ben", "Ann", 100.0, 90.0),
    ];
    let record = &rebuild(&ledger)[&pair_key("Ann", "Ben")];
    assert_eq!(record.regular_wins_for("Ben"), 0);
    assert_eq!(
        record.last_game,
        GameDate {
            season: 2010,
            week: 1
        }
    );
}

#[test]
fn consolation_only_pair_gets_no_record() {
    let ledger = vec![played(
        2010,
        15,
        GameType::Consolation,
        "Gus",
        "Hal",
        80.0,
        70.0,
    )];
    let store = rebuild(&ledger);
    assert!(store.is_empty());
}

#[test]
fn incremental_updates_match_a_full_rebuild() {
    let ledger = sample_ledger();

    // Feed the same games in three uneven batches.
    let mut incremental: H2hStore = H2hStore::new();
    update_with_games(&mut incremental, &ledger[..3]);
    update_with_games(&mut incremental, &ledger[3..4]);
    update_with_games(&mut incremental, &ledger[4..]);

    let full = rebuild(&ledger);

    assert_eq!(incremental.len(), full.len());
    for (key, full_record) in &full {
        let inc = &incremental[key];
        assert_eq!(inc.regular_wins_a, full_record.regular_wins_a);
        assert_eq!(inc.regular_wins_b, full_record.regular_wins_b);
        assert_eq!(inc.playoff_wins_a, full_record.playoff_wins_a);
        assert_eq!(inc.playoff_wins_b, full_record.playoff_wins_b);
        assert_eq!(inc.regular_history.len(), full_record.regular_history.len());
        assert_eq!(inc.current_streak_holder, full_record.current_streak_holder);
        assert_eq!(inc.current_streak_len, full_record.current_streak_len);
        assert_eq!(inc.longest_streak_holder, full_record.longest_streak_holder);
        assert_eq!(inc.longest_streak_len, full_record.longest_streak_len);
        assert_eq!(inc.longest_streak_start, full_record.longest_streak_start);
        assert_eq!(inc.longest_streak_end, full_record.longest_streak_end);
        assert_eq!(inc.last_game, full_record.last_game);
    }
}

#[test]
fn total_wins_equal_decided_games() {
    let ledger = sample_ledger();
    let store = rebuild(&ledger);

    let decided = ledger
        .iter()
        .filter(|g| g.game_type != GameType::Consolation && g.winner_manager.is_some())
        .count();
    let counted: u32 = store
        .values()
        .map(|r| r.regular_wins_a + r.regular_wins_b + r.playoff_wins_a + r.playoff_wins_b)
        .sum();
    assert_eq!(counted as usize, decided);
}

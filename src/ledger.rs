use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::snapshot::app_cache_dir;

/// The role a single matchup played in its season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "regular")]
    Regular,
    #[serde(rename = "QF")]
    Quarterfinal,
    #[serde(rename = "SF")]
    Semifinal,
    #[serde(rename = "1st")]
    Final,
    #[serde(rename = "3rd")]
    ThirdPlace,
    #[serde(rename = "consolation")]
    Consolation,
}

impl GameType {
    pub fn as_str(self) -> &'static str {
        match self {
            GameType::Regular => "regular",
            GameType::Quarterfinal => "QF",
            GameType::Semifinal => "SF",
            GameType::Final => "1st",
            GameType::ThirdPlace => "3rd",
            GameType::Consolation => "consolation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "regular" => Some(GameType::Regular),
            "QF" => Some(GameType::Quarterfinal),
            "SF" => Some(GameType::Semifinal),
            "1st" => Some(GameType::Final),
            "3rd" => Some(GameType::ThirdPlace),
            "consolation" => Some(GameType::Consolation),
            _ => None,
        }
    }

    pub fn is_playoff(self) -> bool {
        matches!(
            self,
            GameType::Quarterfinal | GameType::Semifinal | GameType::Final | GameType::ThirdPlace
        )
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinningSide {
    Team1,
    Team2,
}

/// Single source of truth for winners. Upstream winner/tie flags are only
/// checked against this, never trusted.
pub fn winner_from_scores(score1: f64, score2: f64) -> Option<WinningSide> {
    if score1 > score2 {
        Some(WinningSide::Team1)
    } else if score2 > score1 {
        Some(WinningSide::Team2)
    } else {
        None
    }
}

/// One matchup fact. Exactly one record exists per
/// (season, week, unordered manager pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub season: i32,
    pub week: u32,
    pub game_type: GameType,
    pub team1_manager: String,
    pub team2_manager: String,
    pub team1_score: f64,
    pub team2_score: f64,
    pub winner_manager: Option<String>,
}

impl GameRecord {
    pub fn loser_manager(&self) -> Option<&str> {
        let winner = self.winner_manager.as_deref()?;
        if winner == self.team1_manager {
            Some(&self.team2_manager)
        } else {
            Some(&self.team1_manager)
        }
    }

    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.team1_manager == a && self.team2_manager == b)
            || (self.team1_manager == b && self.team2_manager == a)
    }

    /// Sorted-pair key, shared with the H2H store.
    pub fn pair_key(&self) -> String {
        pair_key(&self.team1_manager, &self.team2_manager)
    }
}

pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}-{b}")
    } else {
        format!("{b}-{a}")
    }
}

/// Non-fatal data conditions accumulated during a build and reported at the
/// end of the run.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    MissingSeasonData {
        season: i32,
    },
    InconsistentWinner {
        season: i32,
        week: u32,
        pair: String,
    },
    UnresolvedBracketSlot {
        season: i32,
        week: u32,
        pair: String,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::MissingSeasonData { season } => {
                write!(f, "season {season}: settings or weekly data missing, skipped")
            }
            BuildWarning::InconsistentWinner { season, week, pair } => {
                write!(
                    f,
                    "season {season} week {week} ({pair}): upstream winner flag disagrees with scores, using scores"
                )
            }
            BuildWarning::UnresolvedBracketSlot { season, week, pair } => {
                write!(
                    f,
                    "season {season} week {week} ({pair}): playoff matchup fits no bracket slot, classified consolation"
                )
            }
        }
    }
}

/// Output of flattening every cached season into one game list.
#[derive(Debug, Clone, Default)]
pub struct LedgerBuild {
    pub games: Vec<GameRecord>,
    pub warnings: Vec<BuildWarning>,
    pub seasons_processed: usize,
    /// Seasons that failed hard (bad source data); others still build.
    pub season_errors: Vec<String>,
}

/// Classify every cached season and flatten the results into the canonical
/// ordered game list. Seasons with missing data are skipped with a warning;
/// seasons with corrupt data are reported and dropped without failing the
/// rest of the build.
pub fn build_from_snapshots(store: &crate::snapshot::SnapshotStore, operator: &str) -> LedgerBuild {
    let mut build = LedgerBuild::default();
    for (season, snap) in &store.seasons {
        match crate::classify::classify_season(snap, operator) {
            Ok(Some(mut classified)) => {
                build.seasons_processed += 1;
                build.warnings.append(&mut classified.warnings);
                build.games.extend(classified.games);
            }
            Ok(None) => build
                .warnings
                .push(BuildWarning::MissingSeasonData { season: *season }),
            Err(err) => build.season_errors.push(format!("season {season}: {err}")),
        }
    }
    build.games.sort_by(|a, b| {
        (a.season, a.week)
            .cmp(&(b.season, b.week))
            .then_with(|| a.pair_key().cmp(&b.pair_key()))
    });
    build
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("ledger.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS games (
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            pair_key TEXT NOT NULL,
            game_type TEXT NOT NULL,
            team1_manager TEXT NOT NULL,
            team2_manager TEXT NOT NULL,
            team1_score REAL NOT NULL,
            team2_score REAL NOT NULL,
            winner_manager TEXT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (season, week, pair_key)
        );
        CREATE INDEX IF NOT EXISTS idx_games_season ON games(season);
        CREATE INDEX IF NOT EXISTS idx_games_pair ON games(pair_key);

        CREATE TABLE IF NOT EXISTS build_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            seasons_processed INTEGER NOT NULL,
            games_upserted INTEGER NOT NULL,
            warnings_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Persist one build's classified games. Upserts are idempotent, so a rebuild
/// over the same snapshot leaves the table unchanged.
pub fn store_ledger(
    conn: &mut Connection,
    games: &[GameRecord],
    seasons_processed: usize,
    warnings: &[BuildWarning],
) -> Result<usize> {
    let started_at = Utc::now().to_rfc3339();

    let tx = conn.transaction().context("begin ledger transaction")?;
    let mut upserted = 0usize;
    for game in games {
        upsert_game(&tx, game)?;
        upserted += 1;
    }
    tx.commit().context("commit ledger transaction")?;

    let warning_strings: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
    let warnings_json = serde_json::to_string(&warning_strings).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO build_runs(started_at, finished_at, seasons_processed, games_upserted, warnings_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            started_at,
            Utc::now().to_rfc3339(),
            seasons_processed as i64,
            upserted as i64,
            warnings_json
        ],
    )
    .context("insert build run")?;

    Ok(upserted)
}

fn upsert_game(tx: &rusqlite::Transaction<'_>, game: &GameRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO games (
            season, week, pair_key, game_type,
            team1_manager, team2_manager, team1_score, team2_score,
            winner_manager, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(season, week, pair_key) DO UPDATE SET
            game_type = excluded.game_type,
            team1_manager = excluded.team1_manager,
            team2_manager = excluded.team2_manager,
            team1_score = excluded.team1_score,
            team2_score = excluded.team2_score,
            winner_manager = excluded.winner_manager,
            updated_at = excluded.updated_at
        "#,
        params![
            game.season as i64,
            game.week as i64,
            game.pair_key(),
            game.game_type.as_str(),
            game.team1_manager,
            game.team2_manager,
            game.team1_score,
            game.team2_score,
            game.winner_manager,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert game")?;
    Ok(())
}

/// The canonical historical dataset, oldest game first.
pub fn load_ledger(conn: &Connection) -> Result<Vec<GameRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT season, week, game_type,
                   team1_manager, team2_manager, team1_score, team2_score,
                   winner_manager
            FROM games
            ORDER BY season ASC, week ASC, pair_key ASC
            "#,
        )
        .context("prepare load ledger query")?;

    let rows = stmt
        .query_map([], |row| {
            let game_type_raw: String = row.get(2)?;
            Ok(GameRecord {
                season: row.get::<_, i64>(0)? as i32,
                week: row.get::<_, i64>(1)? as u32,
                game_type: GameType::parse(&game_type_raw).unwrap_or(GameType::Regular),
                team1_manager: row.get(3)?,
                team2_manager: row.get(4)?,
                team1_score: row.get(5)?,
                team2_score: row.get(6)?,
                winner_manager: row.get(7)?,
            })
        })
        .context("query load ledger")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode game row")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_prefers_higher_score() {
        assert_eq!(winner_from_scores(101.5, 88.2), Some(WinningSide::Team1));
        assert_eq!(winner_from_scores(88.2, 101.5), Some(WinningSide::Team2));
        assert_eq!(winner_from_scores(90.0, 90.0), None);
    }

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(pair_key("Mike", "Jasper"), "Jasper-Mike");
        assert_eq!(pair_key("Jasper", "Mike"), "Jasper-Mike");
    }

    #[test]
    fn game_type_round_trips_labels() {
        for gt in [
            GameType::Regular,
            GameType::Quarterfinal,
            GameType::Semifinal,
            GameType::Final,
            GameType::ThirdPlace,
            GameType::Consolation,
        ] {
            assert_eq!(GameType::parse(gt.as_str()), Some(gt));
        }
        assert!(GameType::Quarterfinal.is_playoff());
        assert!(!GameType::Regular.is_playoff());
        assert!(!GameType::Consolation.is_playoff());
    }

    #[test]
    fn ledger_round_trips_through_sqlite() {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        init_schema(&conn).expect("schema");

        let games = vec![
            GameRecord {
                season: 2019,
                week: 3,
                game_type: GameType::Regular,
                team1_manager: "Mike".to_string(),
                team2_manager: "Jasper".to_string(),
                team1_score: 101.5,
                team2_score: 88.25,
                winner_manager: Some("Mike".to_string()),
            },
            GameRecord {
                season: 2018,
                week: 15,
                game_type: GameType::Final,
                team1_manager: "Ryan".to_string(),
                team2_manager: "Dylan".to_string(),
                team1_score: 120.0,
                team2_score: 119.9,
                winner_manager: Some("Ryan".to_string()),
            },
        ];
        store_ledger(&mut conn, &games, 2, &[]).expect("store");
        // Upsert again; still one row per (season, week, pair).
        store_ledger(&mut conn, &games, 2, &[]).expect("store twice");

        let loaded = load_ledger(&conn).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].season, 2018);
        assert_eq!(loaded[0].game_type, GameType::Final);
        assert_eq!(loaded[1].winner_manager.as_deref(), Some("Mike"));
    }
}

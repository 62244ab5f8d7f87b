use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ledger::{GameRecord, GameType, pair_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameDate {
    pub season: i32,
    pub week: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H2hGameEntry {
    pub winner: String,
    #[serde(rename = "type")]
    pub game_type: GameType,
    pub season: i32,
    pub week: u32,
}

impl H2hGameEntry {
    fn date(&self) -> GameDate {
        GameDate {
            season: self.season,
            week: self.week,
        }
    }
}

/// Cumulative record between one unordered pair of managers. `manager_a` is
/// the lexicographically smaller nickname. Consolation games never reach this
/// struct; ties reach it only to reset the streak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadToHeadRecord {
    pub manager_a: String,
    pub manager_b: String,
    pub regular_wins_a: u32,
    pub regular_wins_b: u32,
    pub playoff_wins_a: u32,
    pub playoff_wins_b: u32,
    pub regular_history: Vec<H2hGameEntry>,
    pub playoff_history: Vec<H2hGameEntry>,
    pub current_streak_holder: Option<String>,
    pub current_streak_len: u32,
    /// First game of the active streak; kept so incremental updates can
    /// extend the longest-streak window without replaying history.
    pub current_streak_start: Option<GameDate>,
    pub longest_streak_holder: Option<String>,
    pub longest_streak_len: u32,
    pub longest_streak_start: Option<GameDate>,
    pub longest_streak_end: Option<GameDate>,
    pub last_game: GameDate,
}

impl HeadToHeadRecord {
    pub fn new(a: &str, b: &str) -> Self {
        let (manager_a, manager_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            manager_a: manager_a.to_string(),
            manager_b: manager_b.to_string(),
            regular_wins_a: 0,
            regular_wins_b: 0,
            playoff_wins_a: 0,
            playoff_wins_b: 0,
            regular_history: Vec::new(),
            playoff_history: Vec::new(),
            current_streak_holder: None,
            current_streak_len: 0,
            current_streak_start: None,
            longest_streak_holder: None,
            longest_streak_len: 0,
            longest_streak_start: None,
            longest_streak_end: None,
            last_game: GameDate { season: 0, week: 0 },
        }
    }

    pub fn key(&self) -> String {
        pair_key(&self.manager_a, &self.manager_b)
    }

    pub fn opponent_of(&self, manager: &str) -> &str {
        if self.manager_a == manager {
            &self.manager_b
        } else {
            &self.manager_a
        }
    }

    pub fn regular_wins_for(&self, manager: &str) -> u32 {
        if self.manager_a == manager {
            self.regular_wins_a
        } else {
            self.regular_wins_b
        }
    }

    pub fn playoff_wins_for(&self, manager: &str) -> u32 {
        if self.manager_a == manager {
            self.playoff_wins_a
        } else {
            self.playoff_wins_b
        }
    }

    /// The single per-game transition. Both the batch rebuild and the
    /// incremental weekly update go through here, which is what makes the
    /// two paths equivalent by construction.
    pub fn apply_game(&mut self, game: &GameRecord) {
        if game.game_type == GameType::Consolation {
            return;
        }
        let date = GameDate {
            season: game.season,
            week: game.week,
        };
        self.last_game = date;

        let Some(winner) = game.winner_manager.as_deref() else {
            // A tie breaks whatever streak was running and counts nothing.
            self.current_streak_holder = None;
            self.current_streak_len = 0;
            self.current_streak_start = None;
            return;
        };

        if self.current_streak_holder.as_deref() == Some(winner) {
            self.current_streak_len += 1;
        } else {
            self.current_streak_holder = Some(winner.to_string());
            self.current_streak_len = 1;
            self.current_streak_start = Some(date);
        }
        // Strictly greater: an equal-length later run never displaces the
        // first one.
        if self.current_streak_len > self.longest_streak_len {
            self.longest_streak_len = self.current_streak_len;
            self.longest_streak_holder = self.current_streak_holder.clone();
            self.longest_streak_start = self.current_streak_start;
            self.longest_streak_end = Some(date);
        }

        let entry = H2hGameEntry {
            winner: winner.to_string(),
            game_type: game.game_type,
            season: game.season,
            week: game.week,
        };
        let winner_is_a = winner == self.manager_a;
        if game.game_type.is_playoff() {
            if winner_is_a {
                self.playoff_wins_a += 1;
            } else {
                self.playoff_wins_b += 1;
            }
            self.playoff_history.push(entry);
        } else {
            if winner_is_a {
                self.regular_wins_a += 1;
            } else {
                self.regular_wins_b += 1;
            }
            self.regular_history.push(entry);
        }
    }

    /// Recompute streak state by replaying the stored histories in order.
    /// Used after identity merges: a streak is a function of ordered history,
    /// so merged counters alone cannot reconstruct it.
    pub fn replay_streaks(&mut self) {
        let mut entries: Vec<&H2hGameEntry> = self
            .regular_history
            .iter()
            .chain(self.playoff_history.iter())
            .collect();
        entries.sort_by_key(|e| e.date());

        self.current_streak_holder = None;
        self.current_streak_len = 0;
        self.current_streak_start = None;
        self.longest_streak_holder = None;
        self.longest_streak_len = 0;
        self.longest_streak_start = None;
        self.longest_streak_end = None;

        for entry in entries {
            let date = entry.date();
            if self.current_streak_holder.as_deref() == Some(entry.winner.as_str()) {
                self.current_streak_len += 1;
            } else {
                self.current_streak_holder = Some(entry.winner.clone());
                self.current_streak_len = 1;
                self.current_streak_start = Some(date);
            }
            if self.current_streak_len > self.longest_streak_len {
                self.longest_streak_len = self.current_streak_len;
                self.longest_streak_holder = self.current_streak_holder.clone();
                self.longest_streak_start = self.current_streak_start;
                self.longest_streak_end = Some(date);
            }
        }
    }
}

pub type H2hStore = BTreeMap<String, HeadToHeadRecord>;

/// Full rebuild: group the ledger by unordered pair and replay each pair's
/// shared history chronologically. Pairs whose only meetings are consolation
/// games get no record at all; absence means "first meeting".
pub fn rebuild(ledger: &[GameRecord]) -> H2hStore {
    let mut by_pair: BTreeMap<String, Vec<&GameRecord>> = BTreeMap::new();
    for game in ledger {
        if game.game_type == GameType::Consolation {
            continue;
        }
        by_pair.entry(game.pair_key()).or_default().push(game);
    }

    by_pair
        .into_par_iter()
        .map(|(key, mut games)| {
            games.sort_by_key(|g| (g.season, g.week));
            let first = games[0];
            let mut record = HeadToHeadRecord::new(&first.team1_manager, &first.team2_manager);
            for game in games {
                record.apply_game(game);
            }
            (key, record)
        })
        .collect()
}

/// Incremental update with newly completed games. Missing prior state for a
/// pair just means a first meeting. Produces the same store a full rebuild
/// over the cumulative ledger would.
pub fn update_with_games(store: &mut H2hStore, new_games: &[GameRecord]) {
    let mut games: Vec<&GameRecord> = new_games
        .iter()
        .filter(|g| g.game_type != GameType::Consolation)
        .collect();
    games.sort_by_key(|g| (g.season, g.week));

    for game in games {
        let record = store
            .entry(game.pair_key())
            .or_insert_with(|| HeadToHeadRecord::new(&game.team1_manager, &game.team2_manager));
        record.apply_game(game);
    }
}

pub fn save_h2h(path: &Path, store: &H2hStore) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let json = serde_json::to_string_pretty(store).context("serialize h2h store")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write h2h store")?;
    fs::rename(&tmp, path).context("swap h2h store")?;
    Ok(())
}

pub fn load_h2h(path: &Path) -> Result<H2hStore> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read h2h store {}", path.display()))?;
    serde_json::from_str(&raw).context("parse h2h store")
}

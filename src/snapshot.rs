use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const SNAPSHOT_VERSION: u32 = 2;
const CACHE_DIR: &str = "y2k_history";
const SNAPSHOT_FILE: &str = "raw_snapshots.json";

/// Per-season playoff shape, straight from Yahoo league settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LeagueSeasonSettings {
    pub playoff_start_week: u32,
    pub num_playoff_teams: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawManager {
    pub nickname: String,
}

/// One side of a matchup. `managers` has at least one entry for valid data;
/// co-managed teams list everyone Yahoo knows about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTeamSide {
    pub team_key: String,
    pub managers: Vec<RawManager>,
    pub points: f64,
}

/// One weekly matchup as reported by the scoreboard endpoint. The playoff
/// and winner flags are upstream signals only; winners are always re-derived
/// from scores downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMatchup {
    pub team1: RawTeamSide,
    pub team2: RawTeamSide,
    pub is_tied: bool,
    pub winner_team_key: Option<String>,
    pub is_playoffs: bool,
    pub is_consolation: bool,
}

/// Everything cached for one season: settings plus completed weeks in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonSnapshot {
    pub season: i32,
    pub settings: Option<LeagueSeasonSettings>,
    #[serde(default)]
    pub weeks: BTreeMap<u32, Vec<RawMatchup>>,
}

impl SeasonSnapshot {
    pub fn new(season: i32) -> Self {
        Self {
            season,
            settings: None,
            weeks: BTreeMap::new(),
        }
    }

    /// Weeks the scoreboard should still be asked about: settings tell us how
    /// long the season runs, completed weeks are already cached.
    pub fn total_weeks(&self) -> Option<u32> {
        let settings = self.settings?;
        let extra = if settings.num_playoff_teams >= 6 { 2 } else { 1 };
        Some(settings.playoff_start_week + extra)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnapshotStore {
    version: u32,
    pub seasons: BTreeMap<i32, SeasonSnapshot>,
}

impl SnapshotStore {
    pub fn season_mut(&mut self, season: i32) -> &mut SeasonSnapshot {
        self.seasons
            .entry(season)
            .or_insert_with(|| SeasonSnapshot::new(season))
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_snapshot_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(SNAPSHOT_FILE))
}

pub fn load_store(path: &Path) -> SnapshotStore {
    let Ok(raw) = fs::read_to_string(path) else {
        return SnapshotStore::default();
    };
    let Ok(store) = serde_json::from_str::<SnapshotStore>(&raw) else {
        return SnapshotStore::default();
    };
    if store.version != SNAPSHOT_VERSION {
        return SnapshotStore::default();
    }
    store
}

pub fn save_store(path: &Path, store: &SnapshotStore) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let mut store = store.clone();
    store.version = SNAPSHOT_VERSION;
    let json = serde_json::to_string(&store).context("serialize snapshot store")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write snapshot store")?;
    fs::rename(&tmp, path).context("swap snapshot store")?;
    Ok(())
}

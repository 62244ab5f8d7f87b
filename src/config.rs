use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One Yahoo league instance. The same fantasy league gets a fresh
/// `league_id` and `game_id` every NFL season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonLeague {
    pub league_id: String,
    pub game_id: u32,
}

/// Static identity-resolution config: alias nickname -> canonical nickname,
/// plus managers/seasons excluded from presentation-layer aggregates.
/// Applied only at aggregation time; the ledger itself is never rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub hidden_managers: Vec<String>,
    #[serde(default)]
    pub hidden_seasons: Vec<i32>,
}

impl MergeConfig {
    pub fn is_hidden(&self, manager: &str) -> bool {
        self.hidden_managers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(manager))
    }

    pub fn is_season_hidden(&self, season: i32) -> bool {
        self.hidden_seasons.contains(&season)
    }

    /// Canonical form of a nickname under the alias table. Chained entries
    /// (old name -> older name -> current name) resolve all the way through;
    /// the hop cap stops a cyclic table from looping forever.
    pub fn canonical<'a>(&'a self, manager: &'a str) -> &'a str {
        let mut current = manager;
        let mut hops = 0;
        while let Some(next) = self.aliases.get(current) {
            if hops >= self.aliases.len() {
                break;
            }
            current = next;
            hops += 1;
        }
        current
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueConfig {
    /// The league operator's own nickname. The operator co-manages several
    /// teams and must not be picked as the manager of record for them.
    pub operator: String,
    pub seasons: BTreeMap<i32, SeasonLeague>,
    #[serde(default)]
    pub merge: MergeConfig,
}

pub fn default_config_path() -> PathBuf {
    std::env::var("Y2K_LEAGUES_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("leagues.json"))
}

pub fn load_league_config(path: &Path) -> Result<LeagueConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read league config {}", path.display()))?;
    let config: LeagueConfig =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(config)
}

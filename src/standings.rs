use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::MergeConfig;
use crate::ledger::{GameRecord, GameType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStanding {
    pub manager: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: f64,
}

impl TeamStanding {
    fn new(manager: &str) -> Self {
        Self {
            manager: manager.to_string(),
            wins: 0,
            losses: 0,
            ties: 0,
            points_for: 0.0,
        }
    }

    pub fn record_label(&self) -> String {
        if self.ties > 0 {
            format!("{}-{}-{}", self.wins, self.losses, self.ties)
        } else {
            format!("{}-{}", self.wins, self.losses)
        }
    }
}

/// Standings over the given games, ranked by (wins desc, points-for desc).
/// Callers filter to the season/week range they care about.
pub fn standings_for_games<'a, I>(games: I) -> Vec<TeamStanding>
where
    I: IntoIterator<Item = &'a GameRecord>,
{
    let mut by_manager: HashMap<String, TeamStanding> = HashMap::new();

    for game in games {
        let entry1 = by_manager
            .entry(game.team1_manager.clone())
            .or_insert_with(|| TeamStanding::new(&game.team1_manager));
        entry1.points_for += game.team1_score;
        let entry2 = by_manager
            .entry(game.team2_manager.clone())
            .or_insert_with(|| TeamStanding::new(&game.team2_manager));
        entry2.points_for += game.team2_score;

        match game.winner_manager.as_deref() {
            Some(winner) => {
                let loser = game.loser_manager().unwrap_or_default().to_string();
                if let Some(w) = by_manager.get_mut(winner) {
                    w.wins += 1;
                }
                if let Some(l) = by_manager.get_mut(&loser) {
                    l.losses += 1;
                }
            }
            None => {
                if let Some(t1) = by_manager.get_mut(&game.team1_manager) {
                    t1.ties += 1;
                }
                if let Some(t2) = by_manager.get_mut(&game.team2_manager) {
                    t2.ties += 1;
                }
            }
        }
    }

    let mut out: Vec<TeamStanding> = by_manager.into_values().collect();
    out.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(b.points_for.total_cmp(&a.points_for))
            .then(a.manager.cmp(&b.manager))
    });
    out
}

pub fn regular_season_standings(ledger: &[GameRecord], season: i32) -> Vec<TeamStanding> {
    standings_for_games(
        ledger
            .iter()
            .filter(|g| g.season == season && g.game_type == GameType::Regular),
    )
}

/// Manager -> 1-based regular-season rank.
pub fn rank_map(standings: &[TeamStanding]) -> HashMap<String, usize> {
    standings
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.manager.clone(), idx + 1))
        .collect()
}

/// Final season placement for every manager.
///
/// Championship / third-place games settle ranks 1-4. QF losers are placed
/// 5th and 6th by regular-season rank: the better regular-season finisher of
/// the two takes 5th. That ordering is league policy, not derivable from the
/// bracket itself. Everyone else keeps their regular-season rank.
pub fn final_ranks_for_season(ledger: &[GameRecord], season: i32) -> HashMap<String, usize> {
    let reg_standings = regular_season_standings(ledger, season);
    let reg_ranks = rank_map(&reg_standings);

    let mut final_ranks: HashMap<String, usize> = HashMap::new();
    let mut qf_losers: Vec<String> = Vec::new();

    for game in ledger
        .iter()
        .filter(|g| g.season == season && g.game_type.is_playoff())
    {
        let Some(winner) = game.winner_manager.as_deref() else {
            continue;
        };
        let Some(loser) = game.loser_manager() else {
            continue;
        };
        match game.game_type {
            GameType::Final => {
                final_ranks.insert(winner.to_string(), 1);
                final_ranks.insert(loser.to_string(), 2);
            }
            GameType::ThirdPlace => {
                final_ranks.insert(winner.to_string(), 3);
                final_ranks.insert(loser.to_string(), 4);
            }
            GameType::Quarterfinal => qf_losers.push(loser.to_string()),
            _ => {}
        }
    }

    qf_losers.sort_by_key(|m| reg_ranks.get(m).copied().unwrap_or(usize::MAX));
    for (idx, loser) in qf_losers.iter().enumerate() {
        final_ranks.insert(loser.clone(), 5 + idx);
    }

    for (manager, reg_rank) in &reg_ranks {
        final_ranks.entry(manager.clone()).or_insert(*reg_rank);
    }
    final_ranks
}

#[derive(Debug, Clone)]
pub struct SeasonSummary {
    pub season: i32,
    pub final_ranks: HashMap<String, usize>,
    pub scoring_champ: Option<String>,
    pub team_count: usize,
}

/// Per-season summaries across the whole ledger, hidden seasons excluded.
pub fn season_summaries(ledger: &[GameRecord], merge: &MergeConfig) -> Vec<SeasonSummary> {
    let mut seasons: Vec<i32> = ledger.iter().map(|g| g.season).collect();
    seasons.sort_unstable();
    seasons.dedup();

    let mut out = Vec::new();
    for season in seasons {
        if merge.is_season_hidden(season) {
            continue;
        }
        let reg_standings = regular_season_standings(ledger, season);
        let scoring_champ = reg_standings
            .iter()
            .max_by(|a, b| a.points_for.total_cmp(&b.points_for))
            .map(|s| s.manager.clone());
        out.push(SeasonSummary {
            season,
            final_ranks: final_ranks_for_season(ledger, season),
            scoring_champ,
            team_count: reg_standings.len(),
        });
    }
    out
}

#[derive(Debug, Clone)]
pub struct AllTimeFinish {
    pub manager: String,
    pub avg_finish: f64,
    pub seasons: usize,
    /// Finishing position -> number of seasons with that finish.
    pub finish_counts: BTreeMap<usize, usize>,
    /// (season, rank), chronological.
    pub history: Vec<(i32, usize)>,
}

/// All-time leaderboard sorted by average finish. Aliases are folded into
/// their canonical manager and hidden managers dropped, both at this
/// aggregation step only.
pub fn all_time_finishes(summaries: &[SeasonSummary], merge: &MergeConfig) -> Vec<AllTimeFinish> {
    let mut by_manager: HashMap<String, Vec<(i32, usize)>> = HashMap::new();
    for summary in summaries {
        for (manager, rank) in &summary.final_ranks {
            let canonical = merge.canonical(manager).to_string();
            by_manager
                .entry(canonical)
                .or_default()
                .push((summary.season, *rank));
        }
    }

    let mut out = Vec::new();
    for (manager, mut history) in by_manager {
        if merge.is_hidden(&manager) {
            continue;
        }
        history.sort_unstable();
        let total: usize = history.iter().map(|(_, r)| *r).sum();
        let mut finish_counts: BTreeMap<usize, usize> = BTreeMap::new();
        for (_, rank) in &history {
            *finish_counts.entry(*rank).or_insert(0) += 1;
        }
        out.push(AllTimeFinish {
            manager,
            avg_finish: total as f64 / history.len() as f64,
            seasons: history.len(),
            finish_counts,
            history,
        });
    }
    out.sort_by(|a, b| {
        a.avg_finish
            .total_cmp(&b.avg_finish)
            .then(a.manager.cmp(&b.manager))
    });
    out
}

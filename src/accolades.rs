use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::MergeConfig;
use crate::ledger::{GameRecord, GameType};

/// A single notable game: who did it, to whom, and the score or margin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccoladeEvent {
    pub manager: String,
    pub opponent: String,
    pub value: f64,
    pub season: i32,
    pub week: u32,
}

/// All-time single-game extremes across the whole ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccoladeRecords {
    pub top_points: Option<AccoladeEvent>,
    pub highest_scoring_loss: Option<AccoladeEvent>,
    pub lowest_scoring_win: Option<AccoladeEvent>,
    pub smallest_margin_defeat: Option<AccoladeEvent>,
    pub blowout_win: Option<AccoladeEvent>,
}

/// Per-manager accolade counts plus the "alternative universe" record, where
/// finishing in the top half of a week's scores counts as a win regardless
/// of the actual matchup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerAccolades {
    pub manager: String,
    pub top_points: u32,
    pub highest_scoring_loss: u32,
    pub lowest_scoring_win: u32,
    pub smallest_margin_defeat: u32,
    pub blowout_win: u32,
    pub alt_wins: u32,
    pub alt_games: u32,
    /// Week-to-week score volatility (sample stddev); the "rollercoaster".
    pub score_stdev: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AccoladeReport {
    pub tallies: Vec<ManagerAccolades>,
    pub records: AccoladeRecords,
}

struct WeekLine {
    manager: String,
    opponent: String,
    score: f64,
    won: bool,
    lost: bool,
}

/// Weekly accolades over regular-season games only; hidden seasons excluded,
/// aliases folded at tally time.
pub fn compute_accolades(ledger: &[GameRecord], merge: &MergeConfig) -> AccoladeReport {
    let mut by_week: BTreeMap<(i32, u32), Vec<&GameRecord>> = BTreeMap::new();
    for game in ledger {
        if game.game_type != GameType::Regular || merge.is_season_hidden(game.season) {
            continue;
        }
        by_week
            .entry((game.season, game.week))
            .or_default()
            .push(game);
    }

    let mut tallies: HashMap<String, ManagerAccolades> = HashMap::new();
    let mut scores_by_manager: HashMap<String, Vec<f64>> = HashMap::new();
    let mut records = AccoladeRecords::default();

    let bump = |tallies: &mut HashMap<String, ManagerAccolades>,
                merge: &MergeConfig,
                manager: &str,
                pick: fn(&mut ManagerAccolades) -> &mut u32| {
        let canonical = merge.canonical(manager).to_string();
        let entry = tallies.entry(canonical.clone()).or_insert_with(|| {
            ManagerAccolades {
                manager: canonical,
                ..ManagerAccolades::default()
            }
        });
        *pick(entry) += 1;
    };

    for ((season, week), games) in &by_week {
        let mut lines: Vec<WeekLine> = Vec::new();
        for game in games {
            let winner = game.winner_manager.as_deref();
            lines.push(WeekLine {
                manager: game.team1_manager.clone(),
                opponent: game.team2_manager.clone(),
                score: game.team1_score,
                won: winner == Some(game.team1_manager.as_str()),
                lost: winner.is_some() && winner != Some(game.team1_manager.as_str()),
            });
            lines.push(WeekLine {
                manager: game.team2_manager.clone(),
                opponent: game.team1_manager.clone(),
                score: game.team2_score,
                won: winner == Some(game.team2_manager.as_str()),
                lost: winner.is_some() && winner != Some(game.team2_manager.as_str()),
            });
        }
        lines.sort_by(|a, b| b.score.total_cmp(&a.score));

        for line in &lines {
            let canonical = merge.canonical(&line.manager).to_string();
            scores_by_manager
                .entry(canonical.clone())
                .or_default()
                .push(line.score);
            let entry = tallies.entry(canonical.clone()).or_insert_with(|| {
                ManagerAccolades {
                    manager: canonical,
                    ..ManagerAccolades::default()
                }
            });
            entry.alt_games += 1;
        }
        // Top half of the week beat "the field" no matter their matchup.
        let median_index = lines.len() / 2;
        for line in lines.iter().take(median_index) {
            bump(&mut tallies, merge, &line.manager, |t| &mut t.alt_wins);
        }

        if let Some(top) = lines.first() {
            let event = event_from_line(top, merge, *season, *week, top.score);
            bump(&mut tallies, merge, &top.manager, |t| &mut t.top_points);
            replace_if(&mut records.top_points, event, merge, |new, old| {
                new.value > old.value
            });
        }

        if let Some(loser) = lines
            .iter()
            .filter(|l| l.lost)
            .max_by(|a, b| a.score.total_cmp(&b.score))
        {
            let event = event_from_line(loser, merge, *season, *week, loser.score);
            bump(&mut tallies, merge, &loser.manager, |t| {
                &mut t.highest_scoring_loss
            });
            replace_if(&mut records.highest_scoring_loss, event, merge, |new, old| {
                new.value > old.value
            });
        }

        if let Some(winner) = lines
            .iter()
            .filter(|l| l.won)
            .min_by(|a, b| a.score.total_cmp(&b.score))
        {
            let event = event_from_line(winner, merge, *season, *week, winner.score);
            bump(&mut tallies, merge, &winner.manager, |t| {
                &mut t.lowest_scoring_win
            });
            replace_if(&mut records.lowest_scoring_win, event, merge, |new, old| {
                new.value < old.value
            });
        }

        // Margin awards come from the games, not the flattened lines.
        let mut decided: Vec<(&&GameRecord, f64)> = games
            .iter()
            .filter(|g| g.winner_manager.is_some())
            .map(|g| (g, (g.team1_score - g.team2_score).abs()))
            .collect();
        decided.sort_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((game, margin)) = decided.first() {
            let loser = game.loser_manager().unwrap_or_default().to_string();
            let winner = game.winner_manager.clone().unwrap_or_default();
            let event = AccoladeEvent {
                manager: merge.canonical(&loser).to_string(),
                opponent: merge.canonical(&winner).to_string(),
                value: *margin,
                season: *season,
                week: *week,
            };
            bump(&mut tallies, merge, &loser, |t| &mut t.smallest_margin_defeat);
            replace_if(&mut records.smallest_margin_defeat, event, merge, |new, old| {
                new.value < old.value
            });
        }
        if let Some((game, margin)) = decided.last() {
            let winner = game.winner_manager.clone().unwrap_or_default();
            let loser = game.loser_manager().unwrap_or_default().to_string();
            let event = AccoladeEvent {
                manager: merge.canonical(&winner).to_string(),
                opponent: merge.canonical(&loser).to_string(),
                value: *margin,
                season: *season,
                week: *week,
            };
            bump(&mut tallies, merge, &winner, |t| &mut t.blowout_win);
            replace_if(&mut records.blowout_win, event, merge, |new, old| {
                new.value > old.value
            });
        }
    }

    for (manager, scores) in &scores_by_manager {
        if let Some(tally) = tallies.get_mut(manager) {
            tally.score_stdev = sample_stdev(scores);
        }
    }

    let mut out: Vec<ManagerAccolades> = tallies
        .into_values()
        .filter(|t| !merge.is_hidden(&t.manager))
        .collect();
    out.sort_by(|a, b| a.manager.cmp(&b.manager));

    AccoladeReport {
        tallies: out,
        records,
    }
}

fn event_from_line(
    line: &WeekLine,
    merge: &MergeConfig,
    season: i32,
    week: u32,
    value: f64,
) -> AccoladeEvent {
    AccoladeEvent {
        manager: merge.canonical(&line.manager).to_string(),
        opponent: merge.canonical(&line.opponent).to_string(),
        value,
        season,
        week,
    }
}

/// All-time record slots carry canonical names and never a hidden manager,
/// same as the tally table.
fn replace_if(
    slot: &mut Option<AccoladeEvent>,
    candidate: AccoladeEvent,
    merge: &MergeConfig,
    better: fn(&AccoladeEvent, &AccoladeEvent) -> bool,
) {
    if merge.is_hidden(&candidate.manager) {
        return;
    }
    match slot {
        Some(current) if !better(&candidate, current) => {}
        _ => *slot = Some(candidate),
    }
}

fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(season: i32, week: u32, m1: &str, m2: &str, s1: f64, s2: f64) -> GameRecord {
        let winner = if s1 > s2 {
            Some(m1.to_string())
        } else if s2 > s1 {
            Some(m2.to_string())
        } else {
            None
        };
        GameRecord {
            season,
            week,
            game_type: GameType::Regular,
            team1_manager: m1.to_string(),
            team2_manager: m2.to_string(),
            team1_score: s1,
            team2_score: s2,
            winner_manager: winner,
        }
    }

    #[test]
    fn weekly_awards_pick_the_right_managers() {
        let ledger = vec![
            game(2020, 1, "A", "B", 150.0, 60.0),  // A: top points + blowout
            game(2020, 1, "C", "D", 120.0, 121.0), // C: highest-scoring loss + smallest margin
            game(2020, 1, "E", "F", 70.0, 65.0),   // E: lowest-scoring win
        ];
        let report = compute_accolades(&ledger, &MergeConfig::default());

        let find = |m: &str| report.tallies.iter().find(|t| t.manager == m).unwrap();
        assert_eq!(find("A").top_points, 1);
        assert_eq!(find("A").blowout_win, 1);
        assert_eq!(find("C").highest_scoring_loss, 1);
        assert_eq!(find("C").smallest_margin_defeat, 1);
        assert_eq!(find("E").lowest_scoring_win, 1);

        // Alt universe: top half of six scores is A (150), D (121), C (120).
        assert_eq!(find("A").alt_wins, 1);
        assert_eq!(find("D").alt_wins, 1);
        assert_eq!(find("C").alt_wins, 1);
        assert_eq!(find("B").alt_wins, 0);
        assert!(report.tallies.iter().all(|t| t.alt_games == 1));

        let record = report.records.blowout_win.as_ref().unwrap();
        assert_eq!(record.manager, "A");
        assert_eq!(record.value, 90.0);
    }

    #[test]
    fn hidden_managers_never_hold_all_time_records() {
        let merge = MergeConfig {
            hidden_managers: vec!["Torin".to_string()],
            ..MergeConfig::default()
        };
        let ledger = vec![
            game(2020, 1, "Torin", "B", 150.0, 60.0), // top score and blowout, both hidden
            game(2020, 2, "A", "B", 110.0, 100.0),
        ];
        let report = compute_accolades(&ledger, &merge);

        assert!(report.tallies.iter().all(|t| t.manager != "Torin"));
        let top = report.records.top_points.as_ref().unwrap();
        assert_eq!(top.manager, "A");
        assert_eq!(top.value, 110.0);
        let blowout = report.records.blowout_win.as_ref().unwrap();
        assert_eq!(blowout.manager, "A");
    }

    #[test]
    fn record_events_carry_canonical_names() {
        let merge = MergeConfig {
            aliases: std::collections::HashMap::from([(
                "OldRyan".to_string(),
                "Ryan".to_string(),
            )]),
            ..MergeConfig::default()
        };
        let ledger = vec![game(2008, 1, "OldRyan", "Mike", 140.0, 70.0)];
        let report = compute_accolades(&ledger, &merge);

        let top = report.records.top_points.as_ref().unwrap();
        assert_eq!(top.manager, "Ryan");
        let blowout = report.records.blowout_win.as_ref().unwrap();
        assert_eq!(blowout.manager, "Ryan");
        assert_eq!(blowout.opponent, "Mike");
    }

    #[test]
    fn hidden_seasons_and_playoff_games_are_excluded() {
        let merge = MergeConfig {
            hidden_seasons: vec![2025],
            ..MergeConfig::default()
        };
        let mut playoff = game(2020, 15, "A", "B", 100.0, 90.0);
        playoff.game_type = GameType::Semifinal;
        let ledger = vec![playoff, game(2025, 1, "A", "B", 100.0, 90.0)];
        let report = compute_accolades(&ledger, &merge);
        assert!(report.tallies.is_empty());
        assert!(report.records.top_points.is_none());
    }
}

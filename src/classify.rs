use std::collections::HashSet;

use anyhow::{Result, anyhow};

use crate::ledger::{BuildWarning, GameRecord, GameType, WinningSide, pair_key, winner_from_scores};
use crate::snapshot::{RawMatchup, RawTeamSide, SeasonSnapshot};
use crate::standings::{rank_map, standings_for_games};

#[derive(Debug, Clone)]
pub struct SeasonClassification {
    pub season: i32,
    pub games: Vec<GameRecord>,
    pub warnings: Vec<BuildWarning>,
}

/// The manager of record for one team side.
///
/// The league operator co-manages several teams, so on a co-managed team the
/// *other* co-manager is the real manager; the operator is only the fallback
/// when nobody else is listed. A team with no managers at all is corrupt
/// source data.
pub fn primary_manager<'a>(team: &'a RawTeamSide, operator: &str) -> Result<&'a str> {
    let first = team
        .managers
        .first()
        .ok_or_else(|| anyhow!("team {} has no managers", team.team_key))?;
    if team.managers.len() == 1 {
        return Ok(&first.nickname);
    }
    Ok(team
        .managers
        .iter()
        .find(|m| m.nickname != operator)
        .map(|m| m.nickname.as_str())
        .unwrap_or(&first.nickname))
}

struct ResolvedMatchup {
    week: u32,
    manager1: String,
    manager2: String,
    score1: f64,
    score2: f64,
    winner: Option<String>,
    loser: Option<String>,
    is_playoffs: bool,
    is_consolation: bool,
    upstream_inconsistent: bool,
}

fn resolve_matchup(week: u32, m: &RawMatchup, operator: &str) -> Result<ResolvedMatchup> {
    let manager1 = primary_manager(&m.team1, operator)?.to_string();
    let manager2 = primary_manager(&m.team2, operator)?.to_string();

    let score_side = winner_from_scores(m.team1.points, m.team2.points);
    let (winner, loser) = match score_side {
        Some(WinningSide::Team1) => (Some(manager1.clone()), Some(manager2.clone())),
        Some(WinningSide::Team2) => (Some(manager2.clone()), Some(manager1.clone())),
        None => (None, None),
    };

    // Upstream flags are a consistency signal only; scores decide.
    let upstream_side = if m.is_tied {
        None
    } else {
        match m.winner_team_key.as_deref() {
            Some(key) if key == m.team1.team_key => Some(WinningSide::Team1),
            Some(key) if key == m.team2.team_key => Some(WinningSide::Team2),
            _ => None,
        }
    };
    let upstream_inconsistent = (m.is_tied && score_side.is_some())
        || (upstream_side.is_some() && upstream_side != score_side);

    Ok(ResolvedMatchup {
        week,
        manager1,
        manager2,
        score1: m.team1.points,
        score2: m.team2.points,
        winner,
        loser,
        is_playoffs: m.is_playoffs,
        is_consolation: m.is_consolation,
        upstream_inconsistent,
    })
}

/// Classify one season's matchups into game roles.
///
/// Pure function of (snapshot, operator): pass 1 derives regular-season
/// standings for bye seeding, pass 2 walks the weeks in order and resolves
/// bracket slots from accumulated winners. Returns `None` when settings or
/// weekly data are missing (the season is skipped, not fatal).
pub fn classify_season(
    snapshot: &SeasonSnapshot,
    operator: &str,
) -> Result<Option<SeasonClassification>> {
    let Some(settings) = snapshot.settings else {
        return Ok(None);
    };
    if snapshot.weeks.is_empty() {
        return Ok(None);
    }

    let season = snapshot.season;
    let playoff_start = settings.playoff_start_week;
    let two_round_bracket = settings.num_playoff_teams >= 6;

    let mut resolved: Vec<ResolvedMatchup> = Vec::new();
    for (week, matchups) in &snapshot.weeks {
        for m in matchups {
            resolved.push(resolve_matchup(*week, m, operator)?);
        }
    }

    // Pass 1: regular-season standings seed the byes. The standings helper
    // works on game records, so build throwaway regular records for the
    // pre-playoff weeks.
    let pre_playoff: Vec<GameRecord> = resolved
        .iter()
        .filter(|r| r.week < playoff_start)
        .map(|r| record_from_resolved(season, r, GameType::Regular))
        .collect();
    let reg_ranks = rank_map(&standings_for_games(pre_playoff.iter()));

    let byes: HashSet<String> = if two_round_bracket {
        let mut seeded: Vec<(&String, usize)> = reg_ranks.iter().map(|(m, r)| (m, *r)).collect();
        seeded.sort_by_key(|(_, rank)| *rank);
        seeded.into_iter().take(2).map(|(m, _)| m.clone()).collect()
    } else {
        HashSet::new()
    };

    // Pass 2: assign roles week by week. Bracket membership for each round
    // comes from the previous round's winners, so order matters.
    let mut qf_winners: HashSet<String> = HashSet::new();
    let mut sf_winners: HashSet<String> = HashSet::new();
    let mut sf_losers: HashSet<String> = HashSet::new();
    let mut games = Vec::with_capacity(resolved.len());
    let mut warnings = Vec::new();

    for r in &resolved {
        if r.upstream_inconsistent {
            warnings.push(BuildWarning::InconsistentWinner {
                season,
                week: r.week,
                pair: pair_key(&r.manager1, &r.manager2),
            });
        }

        let game_type = if r.is_consolation {
            // The source's consolation flag wins over every bracket rule.
            GameType::Consolation
        } else if !r.is_playoffs {
            GameType::Regular
        } else {
            let offset = i64::from(r.week) - i64::from(playoff_start);
            classify_playoff_slot(
                r,
                offset,
                two_round_bracket,
                &byes,
                &mut qf_winners,
                &mut sf_winners,
                &mut sf_losers,
            )
            .unwrap_or_else(|| {
                warnings.push(BuildWarning::UnresolvedBracketSlot {
                    season,
                    week: r.week,
                    pair: pair_key(&r.manager1, &r.manager2),
                });
                GameType::Consolation
            })
        };

        games.push(record_from_resolved(season, r, game_type));
    }

    Ok(Some(SeasonClassification {
        season,
        games,
        warnings,
    }))
}

/// Resolve a playoff-flagged matchup's bracket slot, recording winners for
/// later rounds. `None` means it fits no slot and falls back to consolation.
fn classify_playoff_slot(
    r: &ResolvedMatchup,
    offset: i64,
    two_round_bracket: bool,
    byes: &HashSet<String>,
    qf_winners: &mut HashSet<String>,
    sf_winners: &mut HashSet<String>,
    sf_losers: &mut HashSet<String>,
) -> Option<GameType> {
    let both_in = |set: &HashSet<String>| set.contains(&r.manager1) && set.contains(&r.manager2);

    if two_round_bracket {
        match offset {
            0 => {
                if let Some(winner) = &r.winner {
                    qf_winners.insert(winner.clone());
                }
                Some(GameType::Quarterfinal)
            }
            1 => {
                // Semifinal participants are exactly the QF winners plus the
                // two bye seeds; anything else that week is eliminated teams
                // playing each other.
                let eligible = [&r.manager1, &r.manager2]
                    .iter()
                    .all(|m| qf_winners.contains(*m) || byes.contains(*m));
                if !eligible {
                    return None;
                }
                if let (Some(winner), Some(loser)) = (&r.winner, &r.loser) {
                    sf_winners.insert(winner.clone());
                    sf_losers.insert(loser.clone());
                }
                Some(GameType::Semifinal)
            }
            2 => {
                if both_in(sf_winners) {
                    Some(GameType::Final)
                } else if both_in(sf_losers) {
                    Some(GameType::ThirdPlace)
                } else {
                    None
                }
            }
            _ => None,
        }
    } else {
        match offset {
            0 => {
                if let (Some(winner), Some(loser)) = (&r.winner, &r.loser) {
                    sf_winners.insert(winner.clone());
                    sf_losers.insert(loser.clone());
                }
                Some(GameType::Semifinal)
            }
            1 => {
                if both_in(sf_winners) {
                    Some(GameType::Final)
                } else if both_in(sf_losers) {
                    Some(GameType::ThirdPlace)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn record_from_resolved(season: i32, r: &ResolvedMatchup, game_type: GameType) -> GameRecord {
    GameRecord {
        season,
        week: r.week,
        game_type,
        team1_manager: r.manager1.clone(),
        team2_manager: r.manager2.clone(),
        team1_score: r.score1,
        team2_score: r.score2,
        winner_manager: r.winner.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RawManager;

    fn side(key: &str, nicknames: &[&str], points: f64) -> RawTeamSide {
        RawTeamSide {
            team_key: key.to_string(),
            managers: nicknames
                .iter()
                .map(|n| RawManager {
                    nickname: n.to_string(),
                })
                .collect(),
            points,
        }
    }

    #[test]
    fn primary_manager_prefers_non_operator_co_manager() {
        let solo = side("t.1", &["Mike"], 0.0);
        assert_eq!(primary_manager(&solo, "Dylan").unwrap(), "Mike");

        let co_managed = side("t.2", &["Dylan", "Jasper"], 0.0);
        assert_eq!(primary_manager(&co_managed, "Dylan").unwrap(), "Jasper");

        // Operator listed alone alongside nobody else usable.
        let operator_only = side("t.3", &["Dylan", "Dylan"], 0.0);
        assert_eq!(primary_manager(&operator_only, "Dylan").unwrap(), "Dylan");
    }

    #[test]
    fn primary_manager_rejects_empty_team() {
        let empty = side("t.4", &[], 0.0);
        assert!(primary_manager(&empty, "Dylan").is_err());
    }

    #[test]
    fn upstream_tie_flag_disagreeing_with_scores_is_flagged() {
        let m = RawMatchup {
            team1: side("t.1", &["Mike"], 101.0),
            team2: side("t.2", &["Jasper"], 88.0),
            is_tied: true,
            winner_team_key: None,
            is_playoffs: false,
            is_consolation: false,
        };
        let r = resolve_matchup(3, &m, "Dylan").unwrap();
        assert!(r.upstream_inconsistent);
        // Score-derived result is kept.
        assert_eq!(r.winner.as_deref(), Some("Mike"));
    }

    #[test]
    fn upstream_winner_key_agreeing_is_clean() {
        let m = RawMatchup {
            team1: side("t.1", &["Mike"], 101.0),
            team2: side("t.2", &["Jasper"], 88.0),
            is_tied: false,
            winner_team_key: Some("t.1".to_string()),
            is_playoffs: false,
            is_consolation: false,
        };
        let r = resolve_matchup(3, &m, "Dylan").unwrap();
        assert!(!r.upstream_inconsistent);
    }
}

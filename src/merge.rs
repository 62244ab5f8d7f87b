use crate::config::MergeConfig;
use crate::h2h::{H2hStore, HeadToHeadRecord};
use crate::ledger::pair_key;

/// Fold every record involving an alias identity into the canonical
/// identity's record. The input store is not mutated; the merge config is an
/// explicit argument, never ambient state.
///
/// Idempotent: once applied, no alias keys remain, so a second application
/// is a no-op.
pub fn merge_identities(store: &H2hStore, merge: &MergeConfig) -> H2hStore {
    let mut out = store.clone();

    // Each alias resolves transitively to its final canonical name, so a
    // chained table (old -> older -> current) folds in one pass regardless
    // of iteration order; sorting keeps runs deterministic anyway.
    let mut aliases: Vec<(&String, &str)> = merge
        .aliases
        .keys()
        .map(|alias| (alias, merge.canonical(alias)))
        .collect();
    aliases.sort();

    for (alias, canonical) in aliases {
        if alias == canonical {
            // Cyclic table entry; nothing sane to fold into.
            continue;
        }
        let keys: Vec<String> = out
            .iter()
            .filter(|(_, r)| r.manager_a == *alias || r.manager_b == *alias)
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys {
            let Some(record) = out.remove(&key) else {
                continue;
            };
            let opponent = record.opponent_of(alias).to_string();
            if opponent == *canonical {
                // Alias vs canonical is the same person on two accounts;
                // there is no opponent left to have a record against.
                continue;
            }
            let relabeled = relabel(&record, alias, canonical);
            let new_key = pair_key(canonical, &opponent);
            match out.remove(&new_key) {
                // No collision: the alias record is simply re-keyed.
                None => {
                    out.insert(new_key, relabeled);
                }
                Some(existing) => {
                    out.insert(new_key, combine(existing, relabeled));
                }
            }
        }
    }
    out
}

/// Rewrite every occurrence of `alias` to `canonical`, re-sorting the pair
/// orientation if the rename changes which name is lexicographically first.
fn relabel(record: &HeadToHeadRecord, alias: &str, canonical: &str) -> HeadToHeadRecord {
    let rename = |name: &str| {
        if name == alias {
            canonical.to_string()
        } else {
            name.to_string()
        }
    };

    let renamed_a = rename(&record.manager_a);
    let renamed_b = rename(&record.manager_b);
    let mut out = HeadToHeadRecord::new(&renamed_a, &renamed_b);
    let flipped = out.manager_a != renamed_a;

    if flipped {
        out.regular_wins_a = record.regular_wins_b;
        out.regular_wins_b = record.regular_wins_a;
        out.playoff_wins_a = record.playoff_wins_b;
        out.playoff_wins_b = record.playoff_wins_a;
    } else {
        out.regular_wins_a = record.regular_wins_a;
        out.regular_wins_b = record.regular_wins_b;
        out.playoff_wins_a = record.playoff_wins_a;
        out.playoff_wins_b = record.playoff_wins_b;
    }

    out.regular_history = record
        .regular_history
        .iter()
        .map(|e| {
            let mut e = e.clone();
            e.winner = rename(&e.winner);
            e
        })
        .collect();
    out.playoff_history = record
        .playoff_history
        .iter()
        .map(|e| {
            let mut e = e.clone();
            e.winner = rename(&e.winner);
            e
        })
        .collect();

    out.current_streak_holder = record.current_streak_holder.as_deref().map(&rename);
    out.current_streak_len = record.current_streak_len;
    out.current_streak_start = record.current_streak_start;
    out.longest_streak_holder = record.longest_streak_holder.as_deref().map(&rename);
    out.longest_streak_len = record.longest_streak_len;
    out.longest_streak_start = record.longest_streak_start;
    out.longest_streak_end = record.longest_streak_end;
    out.last_game = record.last_game;
    out
}

/// Merge two records for the same pair: counters add, histories concatenate
/// and re-sort, and streaks are recomputed by replaying the merged history.
/// Counter arithmetic alone cannot produce correct streaks because a streak
/// depends on game order across both sources.
fn combine(mut primary: HeadToHeadRecord, other: HeadToHeadRecord) -> HeadToHeadRecord {
    debug_assert_eq!(primary.manager_a, other.manager_a);
    debug_assert_eq!(primary.manager_b, other.manager_b);

    primary.regular_wins_a += other.regular_wins_a;
    primary.regular_wins_b += other.regular_wins_b;
    primary.playoff_wins_a += other.playoff_wins_a;
    primary.playoff_wins_b += other.playoff_wins_b;

    primary.regular_history.extend(other.regular_history);
    primary
        .regular_history
        .sort_by_key(|e| (e.season, e.week));
    primary.playoff_history.extend(other.playoff_history);
    primary
        .playoff_history
        .sort_by_key(|e| (e.season, e.week));

    primary.last_game = primary.last_game.max(other.last_game);
    primary.replay_streaks();
    primary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::h2h::H2hGameEntry;
    use crate::ledger::GameType;

    fn entry(winner: &str, season: i32, week: u32) -> H2hGameEntry {
        H2hGameEntry {
            winner: winner.to_string(),
            game_type: GameType::Regular,
            season,
            week,
        }
    }

    #[test]
    fn relabel_flips_orientation_when_sort_order_changes() {
        let mut record = HeadToHeadRecord::new("Walt", "Zed");
        record.regular_wins_a = 3; // Walt
        record.regular_wins_b = 1; // Zed
        record.regular_history = vec![entry("Zed", 2019, 2)];
        record.current_streak_holder = Some("Zed".to_string());
        record.current_streak_len = 1;

        // Zed was really Ryan all along; Ryan sorts before Walt.
        let out = relabel(&record, "Zed", "Ryan");
        assert_eq!(out.manager_a, "Ryan");
        assert_eq!(out.manager_b, "Walt");
        assert_eq!(out.regular_wins_a, 1);
        assert_eq!(out.regular_wins_b, 3);
        assert_eq!(out.regular_history[0].winner, "Ryan");
        assert_eq!(out.current_streak_holder.as_deref(), Some("Ryan"));
    }

    #[test]
    fn alias_vs_canonical_record_is_dropped() {
        let mut store = H2hStore::new();
        let record = HeadToHeadRecord::new("OldRyan", "Ryan");
        store.insert(record.key(), record);

        let merge = MergeConfig {
            aliases: HashMap::from([("OldRyan".to_string(), "Ryan".to_string())]),
            ..MergeConfig::default()
        };
        let out = merge_identities(&store, &merge);
        assert!(out.is_empty());
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use y2k_history::ledger;

/// Prints every ledger game between two managers, oldest first. Debugging aid
/// for checking a head-to-head record against the raw game list.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut names: Vec<&String> = Vec::new();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--db" {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            names.push(arg);
        }
    }
    let [manager_a, manager_b] = names.as_slice() else {
        return Err(anyhow!("usage: h2h_lookup <manager> <manager> [--db <path>]"));
    };

    let db_path = parse_db_path_arg(&args)
        .or_else(ledger::default_db_path)
        .context("unable to resolve sqlite path")?;

    let conn = ledger::open_db(&db_path)?;
    let games = ledger::load_ledger(&conn)?;

    let mut between: Vec<&ledger::GameRecord> = games
        .iter()
        .filter(|g| g.is_between(manager_a, manager_b))
        .collect();
    between.sort_by_key(|g| (g.season, g.week));

    if between.is_empty() {
        println!("No games between {manager_a} and {manager_b} in {}", db_path.display());
        return Ok(());
    }

    let mut wins_a = 0u32;
    let mut wins_b = 0u32;
    let mut ties = 0u32;
    for game in &between {
        let outcome = match game.winner_manager.as_deref() {
            Some(winner) => {
                if winner.eq_ignore_ascii_case(manager_a) {
                    wins_a += 1;
                } else {
                    wins_b += 1;
                }
                format!("{winner} wins")
            }
            None => {
                ties += 1;
                "tie".to_string()
            }
        };
        println!(
            "{} wk{:<2} [{}] {} {:.2} - {:.2} {} -> {}",
            game.season,
            game.week,
            game.game_type.as_str(),
            game.team1_manager,
            game.team1_score,
            game.team2_score,
            game.team2_manager,
            outcome,
        );
    }

    println!();
    println!(
        "{} games: {manager_a} {wins_a} - {wins_b} {manager_b} ({ties} ties)",
        between.len()
    );

    Ok(())
}

fn parse_db_path_arg(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

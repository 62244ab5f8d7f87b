use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::accolades::{AccoladeEvent, AccoladeReport};
use crate::config::MergeConfig;
use crate::h2h::H2hStore;
use crate::standings::{AllTimeFinish, SeasonSummary};

const STYLE: &str = r#"
body { font-family: 'Courier New', Courier, monospace; margin: 0; padding: 20px; background-color: #000; color: #0f0; font-size: 0.9em; }
.container { max-width: 900px; margin: 20px auto; background: #000; padding: 20px; border: 1px solid #0f0; }
.nav-bar { background-color: #010; padding: 5px; border: 1px solid #0f0; margin-bottom: 20px; text-align: center; }
.nav-bar a { color: #0f0; text-decoration: none; font-weight: bold; margin: 0 8px; }
.nav-bar a:hover { color: #fff; }
h1 { font-size: 1.8em; color: #0f0; text-align: center; border-bottom: 1px solid #0f0; padding-bottom: 10px; letter-spacing: 2px; }
h2 { color: #fff; border-bottom: 1px solid #050; padding-bottom: 4px; }
table { width: 100%; border-collapse: collapse; margin-bottom: 20px; }
th, td { border: 1px solid #050; padding: 4px 8px; text-align: left; }
th { background-color: #010; color: #fff; }
tr:nth-child(odd) td { background-color: #010; }
.note { color: #aaa; font-size: 0.85em; }
.active { color: #afa; font-weight: bold; }
"#;

/// Everything the site reads; all of it is derived data, computed upstream.
pub struct SiteInputs<'a> {
    pub h2h: &'a H2hStore,
    pub summaries: &'a [SeasonSummary],
    pub all_time: &'a [AllTimeFinish],
    pub accolades: &'a AccoladeReport,
    pub merge: &'a MergeConfig,
}

pub fn render_site(out_dir: &Path, inputs: &SiteInputs<'_>) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create site dir {}", out_dir.display()))?;

    let pages: Vec<(&str, String)> = vec![
        ("index.html", render_index(inputs)),
        ("standings.html", render_standings(inputs)),
        ("h2h.html", render_h2h(inputs)),
        ("streaks.html", render_streaks(inputs)),
        ("accolades.html", render_accolades(inputs)),
    ];

    let mut written = Vec::new();
    for (name, html) in pages {
        let path = out_dir.join(name);
        fs::write(&path, html).with_context(|| format!("write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>:: Y2K League History :: {title} ::</title>
<style>{STYLE}</style>
</head>
<body>
<div class="container">
<div class="nav-bar">
<a href="index.html">Index</a>
<a href="standings.html">Standings</a>
<a href="h2h.html">Head-to-Head</a>
<a href="streaks.html">Streaks</a>
<a href="accolades.html">Accolades</a>
</div>
<h1>{title}</h1>
{body}
</div>
</body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn ordinal(n: usize) -> String {
    let suffix = if (11..=13).contains(&(n % 100)) {
        "th"
    } else {
        match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{n}{suffix}")
}

fn week_label(season: i32, week: u32) -> String {
    format!("Wk{week}'{:02}", season.rem_euclid(100))
}

fn render_index(inputs: &SiteInputs<'_>) -> String {
    let seasons = inputs.summaries.len();
    let champs: Vec<String> = inputs
        .summaries
        .iter()
        .filter_map(|s| {
            let champ = s.final_ranks.iter().find(|(_, rank)| **rank == 1)?;
            Some(format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                s.season,
                escape(inputs.merge.canonical(champ.0))
            ))
        })
        .collect();

    let body = format!(
        "<p class=\"note\">{seasons} seasons of league history, rebuilt from the raw scoreboard archive.</p>\n\
         <h2>Champions</h2>\n<table><tr><th>Season</th><th>Champion</th></tr>{}</table>",
        champs.join("\n")
    );
    page("League History", &body)
}

fn render_standings(inputs: &SiteInputs<'_>) -> String {
    let mut body = String::new();

    body.push_str("<h2>All-Time Final Standings</h2>\n<p class=\"note\">Sorted by average finish.</p>\n");
    body.push_str("<table><tr><th>Rank</th><th>Manager</th><th>Avg Finish</th><th>Seasons</th><th>Finishes</th></tr>\n");
    for (idx, row) in inputs.all_time.iter().enumerate() {
        let finishes = row
            .history
            .iter()
            .map(|(season, rank)| format!("{} ({season})", ordinal(*rank)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td></tr>\n",
            idx + 1,
            escape(&row.manager),
            row.avg_finish,
            row.seasons,
            escape(&finishes),
        );
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Scoring Champs</h2>\n<table><tr><th>Season</th><th>Manager</th><th>Teams</th></tr>\n");
    for summary in inputs.summaries {
        let champ = summary
            .scoring_champ
            .as_deref()
            .map(|m| inputs.merge.canonical(m))
            .unwrap_or("-");
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            summary.season,
            escape(champ),
            summary.team_count,
        );
    }
    body.push_str("</table>\n");

    page("Final Standings", &body)
}

struct PairLine<'a> {
    manager: &'a str,
    opponent: &'a str,
    wins: u32,
    losses: u32,
}

fn render_h2h(inputs: &SiteInputs<'_>) -> String {
    let mut regular: Vec<PairLine<'_>> = Vec::new();
    let mut playoff: Vec<PairLine<'_>> = Vec::new();

    for record in inputs.h2h.values() {
        if inputs.merge.is_hidden(&record.manager_a) || inputs.merge.is_hidden(&record.manager_b) {
            continue;
        }
        for (manager, opponent) in [
            (record.manager_a.as_str(), record.manager_b.as_str()),
            (record.manager_b.as_str(), record.manager_a.as_str()),
        ] {
            regular.push(PairLine {
                manager,
                opponent,
                wins: record.regular_wins_for(manager),
                losses: record.regular_wins_for(opponent),
            });
            playoff.push(PairLine {
                manager,
                opponent,
                wins: record.playoff_wins_for(manager),
                losses: record.playoff_wins_for(opponent),
            });
        }
    }

    let mut body = String::new();

    // Win percentage needs a floor so 1-0 records don't top the board.
    let mut pct_board: Vec<&PairLine<'_>> =
        regular.iter().filter(|l| l.wins >= 3).collect();
    pct_board.sort_by(|a, b| {
        let pa = a.wins as f64 / (a.wins + a.losses).max(1) as f64;
        let pb = b.wins as f64 / (b.wins + b.losses).max(1) as f64;
        pb.total_cmp(&pa).then(b.wins.cmp(&a.wins))
    });
    push_pair_board(
        &mut body,
        "Regular Season H2H Win % (min 3 wins)",
        pct_board.iter().take(10).copied(),
    );

    let mut wins_board: Vec<&PairLine<'_>> = regular.iter().filter(|l| l.wins > 0).collect();
    wins_board.sort_by(|a, b| b.wins.cmp(&a.wins));
    push_pair_board(
        &mut body,
        "Most Regular Season H2H Wins",
        wins_board.iter().take(10).copied(),
    );

    let mut playoff_board: Vec<&PairLine<'_>> = playoff.iter().filter(|l| l.wins > 0).collect();
    playoff_board.sort_by(|a, b| b.wins.cmp(&a.wins));
    push_pair_board(
        &mut body,
        "Most Playoff H2H Wins",
        playoff_board.iter().take(5).copied(),
    );

    page("Head-to-Head", &body)
}

fn push_pair_board<'a>(
    body: &mut String,
    title: &str,
    lines: impl Iterator<Item = &'a PairLine<'a>>,
) {
    let _ = write!(
        body,
        "<h2>{}</h2>\n<table><tr><th>Rank</th><th>Manager</th><th>Opponent</th><th>Record</th><th>Win %</th></tr>\n",
        escape(title)
    );
    for (idx, line) in lines.enumerate() {
        let total = line.wins + line.losses;
        let pct = if total > 0 {
            line.wins as f64 / total as f64
        } else {
            0.0
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}-{}</td><td>{:.3}</td></tr>\n",
            idx + 1,
            escape(line.manager),
            escape(line.opponent),
            line.wins,
            line.losses,
            pct,
        );
    }
    body.push_str("</table>\n");
}

fn render_streaks(inputs: &SiteInputs<'_>) -> String {
    struct StreakLine<'a> {
        winner: &'a str,
        loser: &'a str,
        length: u32,
        active: bool,
        range: String,
    }

    let mut streaks: Vec<StreakLine<'_>> = Vec::new();
    for record in inputs.h2h.values() {
        let Some(winner) = record.longest_streak_holder.as_deref() else {
            continue;
        };
        if record.longest_streak_len == 0 {
            continue;
        }
        let loser = record.opponent_of(winner);
        if inputs.merge.is_hidden(winner) || inputs.merge.is_hidden(loser) {
            continue;
        }
        let active = record.current_streak_holder.as_deref() == Some(winner)
            && record.current_streak_len == record.longest_streak_len;
        let range = match (record.longest_streak_start, record.longest_streak_end) {
            (Some(start), Some(end)) => format!(
                "{} - {}",
                week_label(start.season, start.week),
                week_label(end.season, end.week)
            ),
            _ => "N/A".to_string(),
        };
        streaks.push(StreakLine {
            winner,
            loser,
            length: record.longest_streak_len,
            active,
            range,
        });
    }
    streaks.sort_by(|a, b| b.length.cmp(&a.length));

    let mut body = String::from(
        "<h2>Top All-Time H2H Winning Streaks</h2>\n\
         <table><tr><th>Rank</th><th>Streak</th><th>Winner</th><th>Loser</th><th>Date Range</th></tr>\n",
    );
    for (idx, streak) in streaks.iter().take(15).enumerate() {
        let marker = if streak.active {
            "<span class=\"active\">*</span>"
        } else {
            ""
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            idx + 1,
            streak.length,
            marker,
            escape(streak.winner),
            escape(streak.loser),
            escape(&streak.range),
        );
    }
    body.push_str("</table>\n<p class=\"note\">* = active streak</p>\n");

    page("Streaks", &body)
}

fn render_accolades(inputs: &SiteInputs<'_>) -> String {
    let mut body = String::from(
        "<h2>All-Time Records</h2>\n<table><tr><th>Record</th><th>Detail</th></tr>\n",
    );
    let records = &inputs.accolades.records;
    for (label, event, unit) in [
        ("Top Points", &records.top_points, "pts"),
        ("Highest-Scoring Loss", &records.highest_scoring_loss, "pts"),
        ("Lowest-Scoring Win", &records.lowest_scoring_win, "pts"),
        (
            "Smallest Margin of Defeat",
            &records.smallest_margin_defeat,
            "pt margin",
        ),
        ("Blowout of the Century", &records.blowout_win, "pt margin"),
    ] {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td></tr>\n",
            label,
            escape(&record_detail(event.as_ref(), unit)),
        );
    }
    body.push_str("</table>\n");

    body.push_str(
        "<h2>Accolade Counts</h2>\n\
         <table><tr><th>Manager</th><th>Top Pts</th><th>High Loss</th><th>Low Win</th>\
         <th>Heartbreaks</th><th>Blowouts</th><th>Alt Universe</th><th>Volatility</th></tr>\n",
    );
    for tally in &inputs.accolades.tallies {
        let stdev = tally
            .score_stdev
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}-{}</td><td>{}</td></tr>\n",
            escape(&tally.manager),
            tally.top_points,
            tally.highest_scoring_loss,
            tally.lowest_scoring_win,
            tally.smallest_margin_defeat,
            tally.blowout_win,
            tally.alt_wins,
            tally.alt_games - tally.alt_wins,
            stdev,
        );
    }
    body.push_str("</table>\n");

    page("Accolades", &body)
}

fn record_detail(event: Option<&AccoladeEvent>, unit: &str) -> String {
    match event {
        Some(e) => format!(
            "{:.2} {unit} (by {} vs {}, {})",
            e.value,
            e.manager,
            e.opponent,
            week_label(e.season, e.week)
        ),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_handle_teens() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(111), "111th");
    }

    #[test]
    fn week_labels_use_two_digit_years() {
        assert_eq!(week_label(2019, 4), "Wk4'19");
        assert_eq!(week_label(2005, 14), "Wk14'05");
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}

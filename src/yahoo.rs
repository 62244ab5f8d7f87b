use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::{LeagueSeasonSettings, RawManager, RawMatchup, RawTeamSide, app_cache_dir};

const FANTASY_BASE_URL: &str = "https://fantasysports.yahooapis.com/fantasy/v2";
const TOKEN_URL: &str = "https://api.login.yahoo.com/oauth2/get_token";
const REQUEST_TIMEOUT_SECS: u64 = 15;

const CACHE_VERSION: u32 = 1;
const CACHE_FILE: &str = "yahoo_cache.json";

// Yahoo access tokens last an hour; refresh a bit early.
const TOKEN_TTL_SECS: u64 = 3000;

static CLIENT: OnceCell<Client> = OnceCell::new();
static TOKEN: Mutex<Option<(String, Instant)>> = Mutex::new(None);
static BODY_CACHE: Mutex<Option<BodyCacheFile>> = Mutex::new(None);

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct BodyCacheFile {
    version: u32,
    entries: HashMap<String, CachedBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedBody {
    body: String,
    fetched_at: u64,
}

/// OAuth2 refresh-token exchange. Credentials come from the environment
/// (`.env` is loaded by the bins): YAHOO_CONSUMER_KEY, YAHOO_CONSUMER_SECRET,
/// YAHOO_REFRESH_TOKEN.
fn access_token(client: &Client) -> Result<String> {
    {
        let guard = TOKEN.lock().expect("token lock poisoned");
        if let Some((token, fetched)) = guard.as_ref() {
            if fetched.elapsed() < Duration::from_secs(TOKEN_TTL_SECS) {
                return Ok(token.clone());
            }
        }
    }

    let key = std::env::var("YAHOO_CONSUMER_KEY").context("YAHOO_CONSUMER_KEY not set")?;
    let secret = std::env::var("YAHOO_CONSUMER_SECRET").context("YAHOO_CONSUMER_SECRET not set")?;
    let refresh = std::env::var("YAHOO_REFRESH_TOKEN").context("YAHOO_REFRESH_TOKEN not set")?;

    let basic = BASE64.encode(format!("{key}:{secret}"));
    let resp = client
        .post(TOKEN_URL)
        .header("Authorization", format!("Basic {basic}"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh.as_str()),
            ("redirect_uri", "oob"),
        ])
        .send()
        .context("token request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading token body")?;
    if !status.is_success() {
        return Err(anyhow!("token http {status}: {body}"));
    }

    let value: Value = serde_json::from_str(&body).context("invalid token json")?;
    let token = value
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("token response missing access_token"))?
        .to_string();

    let mut guard = TOKEN.lock().expect("token lock poisoned");
    *guard = Some((token.clone(), Instant::now()));
    Ok(token)
}

/// Fetch a fantasy API resource as JSON, serving from the local body cache
/// unless `force` is set. Completed seasons never change, so a plain
/// cache-forever policy is correct for everything but the current week.
pub fn fetch_resource_cached(client: &Client, resource: &str, force: bool) -> Result<Value> {
    let url = format!("{FANTASY_BASE_URL}/{resource}?format=json");

    if !force {
        let mut guard = BODY_CACHE.lock().expect("body cache lock poisoned");
        let cache = guard.get_or_insert_with(load_body_cache);
        if let Some(entry) = cache.entries.get(&url) {
            return serde_json::from_str(&entry.body).context("invalid cached yahoo json");
        }
    }

    let token = access_token(client)?;
    let resp = client
        .get(&url)
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .with_context(|| format!("request failed: {resource}"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {status} for {resource}: {body}"));
    }

    let value: Value = serde_json::from_str(body.trim())
        .with_context(|| format!("invalid json for {resource}"))?;

    let mut guard = BODY_CACHE.lock().expect("body cache lock poisoned");
    let cache = guard.get_or_insert_with(load_body_cache);
    cache.version = CACHE_VERSION;
    cache.entries.insert(
        url,
        CachedBody {
            body: body.trim().to_string(),
            fetched_at: system_time_secs(),
        },
    );
    let _ = save_body_cache(cache);
    Ok(value)
}

pub fn league_key(game_id: u32, league_id: &str) -> String {
    format!("{game_id}.l.{league_id}")
}

pub fn fetch_season_settings(
    client: &Client,
    game_id: u32,
    league_id: &str,
) -> Result<LeagueSeasonSettings> {
    let resource = format!("league/{}/settings", league_key(game_id, league_id));
    let value = fetch_resource_cached(client, &resource, false)?;
    parse_settings_payload(&value)
        .ok_or_else(|| anyhow!("settings payload missing playoff fields for league {league_id}"))
}

pub fn fetch_week_matchups(
    client: &Client,
    game_id: u32,
    league_id: &str,
    week: u32,
    force: bool,
) -> Result<Vec<RawMatchup>> {
    let resource = format!(
        "league/{}/scoreboard;week={week}",
        league_key(game_id, league_id)
    );
    let value = fetch_resource_cached(client, &resource, force)?;
    Ok(parse_scoreboard_payload(&value))
}

/// Yahoo wraps everything in deeply nested arrays-of-objects whose shape
/// shifts between resources, so parsing walks the tree for the keys it needs
/// instead of trusting a fixed path.
pub fn parse_settings_payload(value: &Value) -> Option<LeagueSeasonSettings> {
    let playoff_start_week = find_key(value, "playoff_start_week").and_then(as_u32_any)?;
    let num_playoff_teams = find_key(value, "num_playoff_teams").and_then(as_u32_any)?;
    Some(LeagueSeasonSettings {
        playoff_start_week,
        num_playoff_teams,
    })
}

pub fn parse_scoreboard_payload(value: &Value) -> Vec<RawMatchup> {
    let mut matchup_values = Vec::new();
    collect_objects_with_key(value, "matchup", &mut matchup_values);

    let mut out = Vec::new();
    for m in matchup_values {
        if let Some(row) = parse_matchup(m) {
            out.push(row);
        }
    }
    out
}

fn parse_matchup(m: &Value) -> Option<RawMatchup> {
    let mut team_values = Vec::new();
    collect_objects_with_key(m, "team", &mut team_values);

    let mut sides = Vec::new();
    for t in team_values {
        if let Some(side) = parse_team_side(t) {
            sides.push(side);
        }
    }
    if sides.len() != 2 {
        return None;
    }
    let team2 = sides.pop()?;
    let team1 = sides.pop()?;

    Some(RawMatchup {
        team1,
        team2,
        is_tied: find_key(m, "is_tied").map(flag_set).unwrap_or(false),
        winner_team_key: find_key(m, "winner_team_key")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        is_playoffs: find_key(m, "is_playoffs").map(flag_set).unwrap_or(false),
        is_consolation: find_key(m, "is_consolation").map(flag_set).unwrap_or(false),
    })
}

fn parse_team_side(t: &Value) -> Option<RawTeamSide> {
    let team_key = find_key(t, "team_key")?.as_str()?.to_string();

    let mut manager_values = Vec::new();
    collect_objects_with_key(t, "manager", &mut manager_values);
    let mut managers = Vec::new();
    for m in manager_values {
        if let Some(nickname) = find_key(m, "nickname").and_then(|v| v.as_str()) {
            if !nickname.is_empty() {
                managers.push(RawManager {
                    nickname: nickname.to_string(),
                });
            }
        }
    }

    let points = find_key(t, "team_points")
        .and_then(|p| find_key(p, "total"))
        .and_then(as_f64_any)
        .unwrap_or(0.0);

    Some(RawTeamSide {
        team_key,
        managers,
        points,
    })
}

/// Depth-first search for the first occurrence of `key`, descending into both
/// objects and Yahoo's numeric-keyed wrapper arrays.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(v) = map.get(key) {
                return Some(v);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// Collect every object that carries `key`, yielding the inner value. Used
/// for the repeated `matchup` / `team` / `manager` wrappers.
fn collect_objects_with_key<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(inner) = map.get(key) {
                out.push(inner);
            }
            for v in map.values() {
                collect_objects_with_key(v, key, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_objects_with_key(v, key, out);
            }
        }
        _ => {}
    }
}

fn as_u32_any(v: &Value) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).ok();
    }
    v.as_str()?.trim().parse::<u32>().ok()
}

fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

// Yahoo boolean flags come back as "1"/"0" strings as often as numbers.
fn flag_set(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

fn load_body_cache() -> BodyCacheFile {
    let Some(path) = cache_path() else {
        return BodyCacheFile::default();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return BodyCacheFile::default();
    };
    let cache = serde_json::from_str::<BodyCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return BodyCacheFile::default();
    }
    cache
}

fn save_body_cache(cache: &BodyCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize yahoo cache")?;
    fs::write(&tmp, json).context("write yahoo cache")?;
    fs::rename(&tmp, &path).context("swap yahoo cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn system_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

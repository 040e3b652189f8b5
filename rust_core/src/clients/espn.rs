//! ESPN site API client.
//!
//! Schedule source for NFL and soccer, plus soccer squads and goal scorers.

use super::{json_f64, json_id, ClientSettings, JsonSource};
use crate::models::{status_called_off, Game, ScorerProfile, Sport, TeamRef};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_BASE_URL: &str = "https://site.api.espn.com";

/// Minutes assumed per appearance when a squad line has no minutes
const MINUTES_PER_APPEARANCE: f64 = 70.0;

/// Goals one player scored in a finished match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerLine {
    pub player_id: String,
    pub name: String,
    pub goals: u32,
}

/// Goal scorers of one match, plus whether it is over
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchScorers {
    pub completed: bool,
    /// Postponed, canceled or abandoned
    #[serde(default)]
    pub called_off: bool,
    pub scorers: HashMap<String, ScorerLine>,
}

#[derive(Clone, Debug)]
pub struct EspnClient {
    source: JsonSource,
}

impl EspnClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, &ClientSettings::default())
    }

    pub fn with_base_url(base_url: &str, settings: &ClientSettings) -> Self {
        Self {
            source: JsonSource::new("espn", base_url, settings),
        }
    }

    /// Check if the ESPN API is available (circuit breaker is not open)
    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    pub async fn scoreboard(&self, sport: &str, league: &str, date: NaiveDate) -> Result<Vec<Game>> {
        let data = self
            .source
            .get_json(
                &format!("/apis/site/v2/sports/{}/{}/scoreboard", sport, league),
                &[("dates", date.format("%Y%m%d").to_string())],
            )
            .await
            .with_context(|| format!("ESPN scoreboard {}/{} for {}", sport, league, date))?;
        Ok(parse_scoreboard(&data, sport_from_path(sport)))
    }

    /// Squad with season scoring lines for one soccer team
    pub async fn soccer_squad(&self, league: &str, team: &TeamRef) -> Result<Vec<ScorerProfile>> {
        let data = self
            .source
            .get_json(
                &format!("/apis/site/v2/sports/soccer/{}/teams/{}/roster", league, team.id),
                &[],
            )
            .await
            .with_context(|| format!("ESPN squad for team {}", team.id))?;
        Ok(parse_squad(&data, &team.abbr))
    }

    pub async fn soccer_scorers(&self, league: &str, event_id: &str) -> Result<MatchScorers> {
        let data = self
            .source
            .get_json(
                &format!("/apis/site/v2/sports/soccer/{}/summary", league),
                &[("event", event_id.to_string())],
            )
            .await
            .with_context(|| format!("ESPN summary for event {}", event_id))?;
        Ok(parse_match_scorers(&data))
    }
}

impl Default for EspnClient {
    fn default() -> Self {
        Self::new()
    }
}

fn sport_from_path(sport: &str) -> Sport {
    match sport {
        "baseball" => Sport::Mlb,
        "soccer" => Sport::Soccer,
        _ => Sport::Nfl,
    }
}

pub fn parse_scoreboard(data: &Value, sport: Sport) -> Vec<Game> {
    let mut games = Vec::new();
    let Some(events) = data["events"].as_array() else {
        return games;
    };

    for event in events {
        let id = json_id(&event["id"]);
        if id.is_empty() {
            continue;
        }
        let competition = &event["competitions"][0];

        let mut home = TeamRef::default();
        let mut away = TeamRef::default();
        if let Some(comps) = competition["competitors"].as_array() {
            for comp in comps {
                let team = &comp["team"];
                let team_ref = TeamRef {
                    id: json_id(&team["id"]),
                    name: team["displayName"].as_str().unwrap_or_default().to_string(),
                    abbr: team["abbreviation"].as_str().unwrap_or_default().to_string(),
                };
                if comp["homeAway"].as_str() == Some("home") {
                    home = team_ref;
                } else {
                    away = team_ref;
                }
            }
        }

        let status_type = &event["status"]["type"];
        let status = status_type["description"]
            .as_str()
            .or_else(|| status_type["name"].as_str())
            .unwrap_or("Scheduled")
            .to_string();

        games.push(Game {
            id,
            sport,
            start_time: event["date"].as_str().and_then(parse_espn_date),
            home,
            away,
            venue: competition["venue"]["fullName"].as_str().map(str::to_string),
            status,
            home_probable: None,
            away_probable: None,
        });
    }
    games
}

/// ESPN dates come as "2024-09-08T17:00Z" (no seconds) or full RFC 3339
fn parse_espn_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// Look up a named stat anywhere under `v` (`{"name": .., "value": ..}`)
fn find_stat(v: &Value, name: &str) -> Option<f64> {
    match v {
        Value::Object(map) => {
            if map.get("name").and_then(Value::as_str) == Some(name) {
                if let Some(value) = map.get("value").and_then(json_f64) {
                    return Some(value);
                }
            }
            map.values().find_map(|child| find_stat(child, name))
        }
        Value::Array(items) => items.iter().find_map(|child| find_stat(child, name)),
        _ => None,
    }
}

pub fn parse_squad(data: &Value, team_abbr: &str) -> Vec<ScorerProfile> {
    let Some(athletes) = data["athletes"].as_array() else {
        return Vec::new();
    };
    athletes
        .iter()
        .filter(|a| {
            let pos = a["position"]["abbreviation"].as_str().unwrap_or_default();
            pos != "G" && pos != "GK"
        })
        .filter_map(|a| {
            let player_id = json_id(&a["id"]);
            if player_id.is_empty() {
                return None;
            }
            let appearances = find_stat(a, "appearances").unwrap_or(0.0);
            if appearances <= 0.0 {
                return None;
            }
            let goals = find_stat(a, "totalGoals").unwrap_or(0.0);
            let minutes = find_stat(a, "minutes")
                .unwrap_or(appearances * MINUTES_PER_APPEARANCE);
            Some(ScorerProfile {
                player_id,
                name: a["displayName"].as_str().unwrap_or_default().to_string(),
                team_abbr: team_abbr.to_string(),
                goals: goals.max(0.0) as u32,
                minutes: minutes.max(0.0) as u32,
                appearances: appearances as u32,
                penalty_taker: find_stat(a, "penaltyKickGoals").unwrap_or(0.0) > 0.0,
                expected_minutes: None,
            })
        })
        .collect()
}

pub fn parse_match_scorers(data: &Value) -> MatchScorers {
    let status = &data["header"]["competitions"][0]["status"]["type"];
    let completed = status["completed"].as_bool().unwrap_or(false);
    let called_off = !completed
        && ["name", "description"]
            .iter()
            .any(|k| status[*k].as_str().map(status_called_off).unwrap_or(false));

    let mut scorers: HashMap<String, ScorerLine> = HashMap::new();
    if let Some(events) = data["keyEvents"].as_array() {
        for ev in events {
            if !ev["scoringPlay"].as_bool().unwrap_or(false) {
                continue;
            }
            let kind = ev["type"]["text"].as_str().unwrap_or_default().to_lowercase();
            if kind.contains("own goal") {
                continue;
            }
            let athlete = &ev["participants"][0]["athlete"];
            let id = json_id(&athlete["id"]);
            if id.is_empty() {
                continue;
            }
            let line = scorers.entry(id.clone()).or_insert_with(|| ScorerLine {
                player_id: id,
                name: athlete["displayName"].as_str().unwrap_or_default().to_string(),
                goals: 0,
            });
            line.goals += 1;
        }
    }

    MatchScorers { completed, called_off, scorers }
}

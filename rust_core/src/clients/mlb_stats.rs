//! MLB Stats API client (statsapi.mlb.com).
//!
//! Schedule with probable pitchers, lineups, season lines and box scores.
//! Parsing is split from fetching so that payload handling can be tested
//! against fixtures.

use super::{json_f64, json_id, json_u32, ClientSettings, JsonSource};
use crate::models::{BatterProfile, Game, Hand, PitcherProfile, ProbablePitcher, Sport, TeamRef};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://statsapi.mlb.com";

/// Player ids per people request
const PEOPLE_CHUNK: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupEntry {
    pub player_id: u64,
    pub name: String,
    pub team_abbr: String,
    pub slot: Option<u8>,
}

/// One player's counting stats from a final box score
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxscoreLine {
    pub player_id: String,
    pub name: String,
    pub hits: u32,
    pub home_runs: u32,
    pub stolen_bases: u32,
    pub plate_appearances: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    fn key(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MlbStatsClient {
    source: JsonSource,
}

impl MlbStatsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, &ClientSettings::default())
    }

    pub fn with_base_url(base_url: &str, settings: &ClientSettings) -> Self {
        Self {
            source: JsonSource::new("mlb_stats", base_url, settings),
        }
    }

    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    pub async fn schedule(&self, date: NaiveDate) -> Result<Vec<Game>> {
        let data = self
            .source
            .get_json(
                "/api/v1/schedule",
                &[
                    ("sportId", "1".to_string()),
                    ("date", date.format("%Y-%m-%d").to_string()),
                    ("hydrate", "probablePitcher,venue,team".to_string()),
                ],
            )
            .await
            .with_context(|| format!("MLB schedule for {}", date))?;
        Ok(parse_schedule(&data))
    }

    /// Batting order for one side; falls back to the active roster
    pub async fn lineup(&self, game: &Game, side: Side) -> Result<Vec<LineupEntry>> {
        let data = self
            .source
            .get_json(&format!("/api/v1/game/{}/boxscore", game.id), &[])
            .await
            .with_context(|| format!("MLB boxscore for game {}", game.id))?;

        let lineup = parse_lineup(&data, side);
        if !lineup.is_empty() {
            return Ok(lineup);
        }

        let team = match side {
            Side::Home => &game.home,
            Side::Away => &game.away,
        };
        debug!("No posted lineup for {} in game {}, using active roster", team.abbr, game.id);
        self.active_roster(team).await
    }

    pub async fn active_roster(&self, team: &TeamRef) -> Result<Vec<LineupEntry>> {
        let data = self
            .source
            .get_json(
                &format!("/api/v1/teams/{}/roster", team.id),
                &[("rosterType", "active".to_string())],
            )
            .await
            .with_context(|| format!("MLB roster for team {}", team.id))?;
        Ok(parse_roster_hitters(&data, &team.abbr))
    }

    /// Season hitting lines for many players, keyed by player id
    pub async fn batter_season(&self, ids: &[u64], season: i32) -> Result<HashMap<u64, BatterProfile>> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(PEOPLE_CHUNK) {
            let data = self.people(chunk, "hitting", season).await?;
            for profile in parse_batters(&data) {
                out.insert(profile.player_id, profile);
            }
        }
        Ok(out)
    }

    pub async fn pitcher_season(&self, id: u64, season: i32) -> Result<Option<PitcherProfile>> {
        let data = self.people(&[id], "pitching", season).await?;
        Ok(parse_pitchers(&data).into_iter().next())
    }

    async fn people(&self, ids: &[u64], group: &str, season: i32) -> Result<Value> {
        let ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.source
            .get_json(
                "/api/v1/people",
                &[
                    ("personIds", ids),
                    (
                        "hydrate",
                        format!("stats(group=[{}],type=[season],season={})", group, season),
                    ),
                ],
            )
            .await
            .with_context(|| format!("MLB {} season stats", group))
    }

    /// Per-player batting lines for a game, keyed by player id
    pub async fn boxscore_stats(&self, game_id: &str) -> Result<HashMap<String, BoxscoreLine>> {
        let data = self
            .source
            .get_json(&format!("/api/v1/game/{}/boxscore", game_id), &[])
            .await
            .with_context(|| format!("MLB boxscore for game {}", game_id))?;
        Ok(parse_boxscore_lines(&data))
    }
}

impl Default for MlbStatsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_team(team: &Value) -> TeamRef {
    TeamRef {
        id: json_id(&team["id"]),
        name: team["name"].as_str().unwrap_or_default().to_string(),
        abbr: team["abbreviation"].as_str().unwrap_or_default().to_string(),
    }
}

fn parse_probable(v: &Value) -> Option<ProbablePitcher> {
    let id = v["id"].as_u64()?;
    Some(ProbablePitcher {
        id,
        name: v["fullName"].as_str().unwrap_or_default().to_string(),
    })
}

pub fn parse_schedule(data: &Value) -> Vec<Game> {
    let mut games = Vec::new();
    let Some(dates) = data["dates"].as_array() else {
        return games;
    };

    for date in dates {
        let Some(events) = date["games"].as_array() else {
            continue;
        };
        for g in events {
            let id = json_id(&g["gamePk"]);
            if id.is_empty() {
                warn!("Schedule entry without gamePk, skipping");
                continue;
            }
            let start_time = g["gameDate"]
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc));

            games.push(Game {
                id,
                sport: Sport::Mlb,
                start_time,
                home: parse_team(&g["teams"]["home"]["team"]),
                away: parse_team(&g["teams"]["away"]["team"]),
                venue: g["venue"]["name"].as_str().map(str::to_string),
                status: g["status"]["detailedState"]
                    .as_str()
                    .unwrap_or("Scheduled")
                    .to_string(),
                home_probable: parse_probable(&g["teams"]["home"]["probablePitcher"]),
                away_probable: parse_probable(&g["teams"]["away"]["probablePitcher"]),
            });
        }
    }
    games
}

pub fn parse_lineup(data: &Value, side: Side) -> Vec<LineupEntry> {
    let team = &data["teams"][side.key()];
    let abbr = team["team"]["abbreviation"].as_str().unwrap_or_default();
    let Some(order) = team["battingOrder"].as_array() else {
        return Vec::new();
    };

    order
        .iter()
        .enumerate()
        .filter_map(|(i, id)| {
            let id = id.as_u64()?;
            let player = &team["players"][format!("ID{}", id)];
            Some(LineupEntry {
                player_id: id,
                name: player["person"]["fullName"].as_str().unwrap_or_default().to_string(),
                team_abbr: abbr.to_string(),
                slot: Some((i + 1).min(9) as u8),
            })
        })
        .collect()
}

pub fn parse_roster_hitters(data: &Value, team_abbr: &str) -> Vec<LineupEntry> {
    data["roster"]
        .as_array()
        .map(|roster| {
            roster
                .iter()
                .filter(|r| r["position"]["type"].as_str() != Some("Pitcher"))
                .filter_map(|r| {
                    Some(LineupEntry {
                        player_id: r["person"]["id"].as_u64()?,
                        name: r["person"]["fullName"].as_str().unwrap_or_default().to_string(),
                        team_abbr: team_abbr.to_string(),
                        slot: None,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn season_stat(person: &Value) -> &Value {
    &person["stats"][0]["splits"][0]["stat"]
}

pub fn parse_batters(data: &Value) -> Vec<BatterProfile> {
    let Some(people) = data["people"].as_array() else {
        return Vec::new();
    };
    people
        .iter()
        .filter_map(|p| {
            let stat = season_stat(p);
            Some(BatterProfile {
                player_id: p["id"].as_u64()?,
                name: p["fullName"].as_str().unwrap_or_default().to_string(),
                team_abbr: String::new(),
                bats: p["batSide"]["code"].as_str().and_then(Hand::from_code),
                lineup_slot: None,
                games: json_u32(&stat["gamesPlayed"]),
                plate_appearances: json_u32(&stat["plateAppearances"]),
                at_bats: json_u32(&stat["atBats"]),
                hits: json_u32(&stat["hits"]),
                home_runs: json_u32(&stat["homeRuns"]),
                stolen_bases: json_u32(&stat["stolenBases"]),
                caught_stealing: json_u32(&stat["caughtStealing"]),
                walks: json_u32(&stat["baseOnBalls"]),
                hit_by_pitch: json_u32(&stat["hitByPitch"]),
            })
        })
        .collect()
}

/// Baseball innings notation: "123.1" is 123 and one third
pub fn parse_innings(v: &Value) -> f64 {
    let Some(raw) = json_f64(v) else {
        return 0.0;
    };
    let whole = raw.trunc();
    let outs = ((raw - whole) * 10.0).round();
    whole + outs / 3.0
}

pub fn parse_pitchers(data: &Value) -> Vec<PitcherProfile> {
    let Some(people) = data["people"].as_array() else {
        return Vec::new();
    };
    people
        .iter()
        .filter_map(|p| {
            let stat = season_stat(p);
            Some(PitcherProfile {
                player_id: p["id"].as_u64()?,
                name: p["fullName"].as_str().unwrap_or_default().to_string(),
                throws: p["pitchHand"]["code"].as_str().and_then(Hand::from_code),
                innings_pitched: parse_innings(&stat["inningsPitched"]),
                batters_faced: json_u32(&stat["battersFaced"]),
                home_runs_allowed: json_u32(&stat["homeRuns"]),
                hits_allowed: json_u32(&stat["hits"]),
                at_bats_against: json_u32(&stat["atBats"]),
            })
        })
        .collect()
}

pub fn parse_boxscore_lines(data: &Value) -> HashMap<String, BoxscoreLine> {
    let mut out = HashMap::new();
    for side in [Side::Home, Side::Away] {
        let Some(players) = data["teams"][side.key()]["players"].as_object() else {
            continue;
        };
        for player in players.values() {
            let batting = &player["stats"]["batting"];
            if batting.as_object().map_or(true, |b| b.is_empty()) {
                continue;
            }
            let id = json_id(&player["person"]["id"]);
            if id.is_empty() {
                continue;
            }
            let line = BoxscoreLine {
                player_id: id.clone(),
                name: player["person"]["fullName"].as_str().unwrap_or_default().to_string(),
                hits: json_u32(&batting["hits"]),
                home_runs: json_u32(&batting["homeRuns"]),
                stolen_bases: json_u32(&batting["stolenBases"]),
                plate_appearances: json_u32(&batting["plateAppearances"]),
            };
            out.insert(id, line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_schedule() {
        let data = json!({
            "dates": [{
                "games": [{
                    "gamePk": 745123,
                    "gameDate": "2024-06-01T23:05:00Z",
                    "status": {"detailedState": "Scheduled"},
                    "venue": {"name": "Coors Field"},
                    "teams": {
                        "home": {
                            "team": {"id": 115, "name": "Colorado Rockies", "abbreviation": "COL"},
                            "probablePitcher": {"id": 608566, "fullName": "Cal Quantrill"}
                        },
                        "away": {
                            "team": {"id": 119, "name": "Los Angeles Dodgers", "abbreviation": "LAD"}
                        }
                    }
                }, {
                    "status": {"detailedState": "Scheduled"}
                }]
            }]
        });
        let games = parse_schedule(&data);
        assert_eq!(games.len(), 1);
        let g = &games[0];
        assert_eq!(g.id, "745123");
        assert_eq!(g.matchup(), "LAD @ COL");
        assert_eq!(g.venue.as_deref(), Some("Coors Field"));
        assert_eq!(g.home_probable.as_ref().unwrap().id, 608566);
        assert!(g.away_probable.is_none());
        assert!(g.start_time.is_some());
    }

    #[test]
    fn test_parse_schedule_empty_payload() {
        assert!(parse_schedule(&json!({})).is_empty());
        assert!(parse_schedule(&json!({"dates": []})).is_empty());
    }

    #[test]
    fn test_parse_lineup_and_boxscore() {
        let data = json!({
            "teams": {
                "home": {
                    "team": {"abbreviation": "NYY"},
                    "battingOrder": [592450, 665742],
                    "players": {
                        "ID592450": {
                            "person": {"id": 592450, "fullName": "Aaron Judge"},
                            "stats": {"batting": {"hits": 2, "homeRuns": 1, "stolenBases": 0, "plateAppearances": 5}}
                        },
                        "ID665742": {
                            "person": {"id": 665742, "fullName": "Juan Soto"},
                            "stats": {"batting": {"hits": 0, "homeRuns": 0, "stolenBases": 1, "plateAppearances": 4}}
                        },
                        "ID1": {
                            "person": {"id": 1, "fullName": "Bench Guy"},
                            "stats": {"batting": {}}
                        }
                    }
                },
                "away": {"team": {"abbreviation": "BOS"}, "battingOrder": [], "players": {}}
            }
        });

        let lineup = parse_lineup(&data, Side::Home);
        assert_eq!(lineup.len(), 2);
        assert_eq!(lineup[0].name, "Aaron Judge");
        assert_eq!(lineup[0].slot, Some(1));
        assert_eq!(lineup[1].slot, Some(2));
        assert_eq!(lineup[1].team_abbr, "NYY");
        assert!(parse_lineup(&data, Side::Away).is_empty());

        let lines = parse_boxscore_lines(&data);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines["592450"].home_runs, 1);
        assert_eq!(lines["592450"].hits, 2);
        assert_eq!(lines["665742"].stolen_bases, 1);
        assert!(!lines.contains_key("1"));
    }

    #[test]
    fn test_parse_roster_skips_pitchers() {
        let data = json!({
            "roster": [
                {"person": {"id": 1, "fullName": "Hitter"}, "position": {"type": "Outfielder"}},
                {"person": {"id": 2, "fullName": "Arm"}, "position": {"type": "Pitcher"}}
            ]
        });
        let hitters = parse_roster_hitters(&data, "SEA");
        assert_eq!(hitters.len(), 1);
        assert_eq!(hitters[0].player_id, 1);
        assert_eq!(hitters[0].slot, None);
    }

    #[test]
    fn test_parse_people() {
        let data = json!({
            "people": [{
                "id": 660271,
                "fullName": "Shohei Ohtani",
                "batSide": {"code": "L"},
                "pitchHand": {"code": "R"},
                "stats": [{"splits": [{"stat": {
                    "gamesPlayed": 150, "plateAppearances": 650, "atBats": 580,
                    "hits": 180, "homeRuns": 50, "stolenBases": 50, "caughtStealing": 4,
                    "baseOnBalls": 70, "hitByPitch": 6,
                    "inningsPitched": "132.1", "battersFaced": 540
                }}]}]
            }, {
                "id": 1,
                "fullName": "Rookie",
                "stats": []
            }]
        });
        let batters = parse_batters(&data);
        assert_eq!(batters.len(), 2);
        assert_eq!(batters[0].bats, Some(Hand::L));
        assert_eq!(batters[0].home_runs, 50);
        assert_eq!(batters[0].walks, 70);
        assert_eq!(batters[1].plate_appearances, 0);

        let pitchers = parse_pitchers(&data);
        assert_eq!(pitchers[0].throws, Some(Hand::R));
        assert!((pitchers[0].innings_pitched - (132.0 + 1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(pitchers[0].batters_faced, 540);
    }

    #[test]
    fn test_parse_innings() {
        assert_eq!(parse_innings(&json!("6.2")), 6.0 + 2.0 / 3.0);
        assert_eq!(parse_innings(&json!(null)), 0.0);
    }
}

//! The Odds API v4 client for events and player prop prices.

use super::{json_id, ClientSettings, JsonSource};
use crate::models::{Game, MarketQuote, PropMarket};
use crate::utils::matching::{normalize_player_name, MatchConfidence, PlayerIndex};
use crate::utils::odds::american_to_decimal;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.the-odds-api.com";

/// Line a 1+ prop is quoted at (Over 0.5)
const ONE_PLUS_POINT: f64 = 0.5;
/// Line a 2+ hits prop is quoted at (Over 1.5)
const TWO_HITS_POINT: f64 = 1.5;

/// Whether an outcome's line is the one our market prices.
///
/// 1+ markets also list alt lines (Over 1.5 HR is a 2+ HR bet); only the
/// 0.5 line, or a yes/no outcome with no point, counts.
fn line_matches(market: PropMarket, point: Option<f64>) -> bool {
    match (market, point) {
        (PropMarket::TwoPlusHits, Some(p)) => (p - TWO_HITS_POINT).abs() < 1e-9,
        (PropMarket::TwoPlusHits, None) => false,
        (_, Some(p)) => (p - ONE_PLUS_POINT).abs() < 1e-9,
        (_, None) => true,
    }
}

/// Player plus line, so an Under is only paired with its own Over
fn side_key(player: &str, point: Option<f64>) -> (String, Option<u64>) {
    (normalize_player_name(player), point.map(f64::to_bits))
}

/// Odds API market key for a prop market
pub fn market_key(market: PropMarket) -> &'static str {
    match market {
        PropMarket::HomeRun => "batter_home_runs",
        PropMarket::StolenBase => "batter_stolen_bases",
        PropMarket::TwoPlusHits => "batter_hits",
        PropMarket::AnytimeGoal => "player_goal_scorer_anytime",
    }
}

fn market_from_key(key: &str) -> Option<PropMarket> {
    PropMarket::ALL.iter().copied().find(|m| market_key(*m) == key)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: Option<DateTime<Utc>>,
}

impl OddsEvent {
    /// Whether this event is the same fixture as a schedule game
    pub fn matches_game(&self, game: &Game) -> bool {
        let same = |a: &str, b: &str| {
            let (a, b) = (normalize_player_name(a), normalize_player_name(b));
            !a.is_empty() && !b.is_empty() && (a == b || a.contains(&b) || b.contains(&a))
        };
        same(&self.home_team, &game.home.name) && same(&self.away_team, &game.away.name)
    }
}

/// Best available price per (market, player) across books
#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    best: HashMap<(PropMarket, String), (String, MarketQuote)>,
    index: HashMap<PropMarket, PlayerIndex<MarketQuote>>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a quote, keeping it only if it pays more than the current best
    pub fn insert(&mut self, market: PropMarket, player: &str, quote: MarketQuote) {
        let key = (market, normalize_player_name(player));
        let better = match self.best.get(&key) {
            Some((_, current)) => pays_more(&quote, current),
            None => true,
        };
        if better {
            self.index
                .entry(market)
                .or_insert_with(PlayerIndex::new)
                .insert(player, quote.clone());
            self.best.insert(key, (player.to_string(), quote));
        }
    }

    pub fn merge(&mut self, other: QuoteBook) {
        for ((market, _), (player, quote)) in other.best {
            self.insert(market, &player, quote);
        }
    }

    pub fn get(&self, market: PropMarket, player: &str) -> Option<&MarketQuote> {
        match self.index.get(&market)?.find(player) {
            (Some(q), MatchConfidence::Exact | MatchConfidence::Fuzzy) => Some(q),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }
}

fn pays_more(a: &MarketQuote, b: &MarketQuote) -> bool {
    let da = american_to_decimal(a.american).unwrap_or(0.0);
    let db = american_to_decimal(b.american).unwrap_or(0.0);
    da > db
}

#[derive(Clone, Debug)]
pub struct OddsApiClient {
    source: JsonSource,
    api_key: String,
    regions: String,
}

impl OddsApiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, &ClientSettings::default())
    }

    pub fn with_base_url(api_key: &str, base_url: &str, settings: &ClientSettings) -> Self {
        Self {
            source: JsonSource::new("odds_api", base_url, settings),
            api_key: api_key.to_string(),
            regions: "us".to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    pub async fn events(&self, sport_key: &str) -> Result<Vec<OddsEvent>> {
        let data = self
            .source
            .get_json(
                &format!("/v4/sports/{}/events", sport_key),
                &[("apiKey", self.api_key.clone())],
            )
            .await
            .with_context(|| format!("Odds API events for {}", sport_key))?;
        Ok(parse_events(&data))
    }

    pub async fn player_props(
        &self,
        sport_key: &str,
        event_id: &str,
        markets: &[PropMarket],
    ) -> Result<QuoteBook> {
        if markets.is_empty() {
            return Ok(QuoteBook::new());
        }
        let keys = markets
            .iter()
            .map(|m| market_key(*m))
            .collect::<Vec<_>>()
            .join(",");

        let data = self
            .source
            .get_json(
                &format!("/v4/sports/{}/events/{}/odds", sport_key, event_id),
                &[
                    ("apiKey", self.api_key.clone()),
                    ("regions", self.regions.clone()),
                    ("markets", keys),
                    ("oddsFormat", "american".to_string()),
                ],
            )
            .await
            .with_context(|| format!("Odds API props for event {}", event_id))?;

        let book = parse_player_props(&data);
        debug!("Odds API event {}: {} player quotes", event_id, book.len());
        Ok(book)
    }
}

pub fn parse_events(data: &Value) -> Vec<OddsEvent> {
    data.as_array()
        .map(|events| {
            events
                .iter()
                .filter_map(|e| {
                    let id = json_id(&e["id"]);
                    if id.is_empty() {
                        return None;
                    }
                    Some(OddsEvent {
                        id,
                        home_team: e["home_team"].as_str().unwrap_or_default().to_string(),
                        away_team: e["away_team"].as_str().unwrap_or_default().to_string(),
                        commence_time: e["commence_time"]
                            .as_str()
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|d| d.with_timezone(&Utc)),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn price(v: &Value) -> Option<i32> {
    v.as_i64().map(|p| p as i32)
}

fn is_yes_side(name: &str) -> bool {
    matches!(name, "Over" | "Yes")
}

/// Read every bookmaker's player markets into a `QuoteBook`.
///
/// Player name is the outcome `description`; Over/Yes is the side priced,
/// and the matching Under/No is kept for no-vig implied probability.
pub fn parse_player_props(data: &Value) -> QuoteBook {
    let mut book = QuoteBook::new();
    let Some(bookmakers) = data["bookmakers"].as_array() else {
        return book;
    };

    for bm in bookmakers {
        let book_name = bm["title"]
            .as_str()
            .or_else(|| bm["key"].as_str())
            .unwrap_or("unknown")
            .to_string();
        let Some(markets) = bm["markets"].as_array() else {
            continue;
        };

        for m in markets {
            let Some(market) = m["key"].as_str().and_then(market_from_key) else {
                continue;
            };
            let Some(outcomes) = m["outcomes"].as_array() else {
                continue;
            };

            let point_ok = |o: &Value| line_matches(market, o["point"].as_f64());

            let mut opposing: HashMap<(String, Option<u64>), i32> = HashMap::new();
            for o in outcomes.iter().filter(|o| point_ok(o)) {
                let side = o["name"].as_str().unwrap_or_default();
                let player = o["description"].as_str().unwrap_or_default();
                if !is_yes_side(side) && !player.is_empty() {
                    if let Some(p) = price(&o["price"]) {
                        opposing.insert(side_key(player, o["point"].as_f64()), p);
                    }
                }
            }

            for o in outcomes.iter().filter(|o| point_ok(o)) {
                let side = o["name"].as_str().unwrap_or_default();
                let player = o["description"].as_str().unwrap_or_default();
                if !is_yes_side(side) || player.is_empty() {
                    continue;
                }
                let Some(american) = price(&o["price"]) else {
                    continue;
                };
                book.insert(
                    market,
                    player,
                    MarketQuote {
                        book: book_name.clone(),
                        american,
                        opposing_american: opposing
                            .get(&side_key(player, o["point"].as_f64()))
                            .copied(),
                    },
                );
            }
        }
    }
    book
}

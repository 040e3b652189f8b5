//! Grading of saved picks against final box scores, and the daily backfill.
//!
//! Backfill loads a day's picks, grades every pick whose game is final,
//! persists the graded day and feeds the outcomes into calibration. A day
//! is absorbed into calibration at most once; until all of its games are
//! final or called off it can be regraded.

use crate::calibration::CalibrationTable;
use crate::clients::{EspnClient, MlbStatsClient};
use crate::error::StoreError;
use crate::league_config::default_league;
use crate::models::{DailyPicks, GradedDay, GradedPick, Outcome, Pick, PropMarket, Sport};
use crate::store::PicksStore;
use crate::utils::matching::normalize_player_name;
use crate::utils::odds::american_to_decimal;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// One player's counting stats in a game
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub name: String,
    pub home_runs: u32,
    pub stolen_bases: u32,
    pub hits: u32,
    pub goals: u32,
}

impl PlayerStats {
    pub fn stat(&self, market: PropMarket) -> u32 {
        match market {
            PropMarket::HomeRun => self.home_runs,
            PropMarket::StolenBase => self.stolen_bases,
            PropMarket::TwoPlusHits => self.hits,
            PropMarket::AnytimeGoal => self.goals,
        }
    }
}

/// Final (or in-progress) stats for one game
#[derive(Debug, Clone, Default)]
pub struct GameResult {
    pub completed: bool,
    /// Postponed, cancelled or suspended: picks void and the day can be
    /// calibrated without waiting on it
    pub called_off: bool,
    /// Players keyed by id
    pub players: HashMap<String, PlayerStats>,
    /// When set, a player missing from `players` counts as zero instead of
    /// void. Soccer summaries only list scorers.
    pub absent_is_zero: bool,
}

impl GameResult {
    pub fn called_off() -> Self {
        Self {
            called_off: true,
            ..Default::default()
        }
    }

    /// Final, or never going to be final on this date
    pub fn decided(&self) -> bool {
        self.completed || self.called_off
    }

    fn find(&self, pick: &Pick) -> Option<&PlayerStats> {
        self.players.get(&pick.player_id).or_else(|| {
            let wanted = normalize_player_name(&pick.player_name);
            self.players
                .values()
                .find(|p| normalize_player_name(&p.name) == wanted)
        })
    }
}

/// Grade picks against game results.
///
/// A pick is `Hit` when the stat reaches the market threshold, `Void` when
/// the game is not final or the player has no line.
pub fn grade_picks(picks: &[Pick], results: &HashMap<String, GameResult>) -> Vec<GradedPick> {
    picks
        .iter()
        .map(|pick| {
            let (outcome, actual) = match results.get(&pick.game_id) {
                Some(game) if game.completed => match game.find(pick) {
                    Some(line) => {
                        let value = line.stat(pick.market);
                        let outcome = if value >= pick.market.threshold() {
                            Outcome::Hit
                        } else {
                            Outcome::Miss
                        };
                        (outcome, Some(value))
                    }
                    None if game.absent_is_zero => (Outcome::Miss, Some(0)),
                    None => (Outcome::Void, None),
                },
                _ => (Outcome::Void, None),
            };
            GradedPick {
                pick: pick.clone(),
                outcome,
                actual,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketTally {
    pub hits: usize,
    pub misses: usize,
    pub voids: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub date: NaiveDate,
    pub total: usize,
    pub hits: usize,
    pub misses: usize,
    pub voids: usize,
    /// Hits over graded (non-void) picks
    pub hit_rate: Option<f64>,
    /// Flat 1u on every priced, graded pick at its quoted odds
    pub units_profit: f64,
    pub by_market: HashMap<String, MarketTally>,
    /// Markets whose calibration multiplier moved
    pub calibration_updated: Vec<PropMarket>,
    /// Whether calibration has absorbed this day (now or earlier)
    pub calibrated: bool,
    /// Set when the day had already been absorbed and nothing was redone
    pub already_graded: bool,
}

impl BackfillSummary {
    pub fn from_graded(date: NaiveDate, graded: &[GradedPick]) -> Self {
        let mut summary = Self {
            date,
            total: graded.len(),
            hits: 0,
            misses: 0,
            voids: 0,
            hit_rate: None,
            units_profit: 0.0,
            by_market: HashMap::new(),
            calibration_updated: Vec::new(),
            calibrated: false,
            already_graded: false,
        };

        for g in graded {
            let tally = summary
                .by_market
                .entry(g.pick.market.key().to_string())
                .or_default();
            match g.outcome {
                Outcome::Hit => {
                    summary.hits += 1;
                    tally.hits += 1;
                }
                Outcome::Miss => {
                    summary.misses += 1;
                    tally.misses += 1;
                }
                Outcome::Void => {
                    summary.voids += 1;
                    tally.voids += 1;
                }
            }
            summary.units_profit += flat_profit(g);
        }

        let decided = summary.hits + summary.misses;
        if decided > 0 {
            summary.hit_rate = Some(summary.hits as f64 / decided as f64);
        }
        summary
    }
}

fn flat_profit(g: &GradedPick) -> f64 {
    let Some(decimal) = g.pick.american_odds.and_then(american_to_decimal) else {
        return 0.0;
    };
    match g.outcome {
        Outcome::Hit => decimal - 1.0,
        Outcome::Miss => -1.0,
        Outcome::Void => 0.0,
    }
}

/// Where final stats come from
#[async_trait]
pub trait ResultsSource: Send + Sync {
    async fn game_results(
        &self,
        date: NaiveDate,
        sport: Sport,
        game_ids: &[String],
    ) -> Result<HashMap<String, GameResult>>;
}

/// Results from the MLB Stats API and ESPN
#[derive(Debug, Clone)]
pub struct LiveResults {
    pub mlb: MlbStatsClient,
    pub espn: EspnClient,
    pub concurrency: usize,
}

impl LiveResults {
    async fn mlb_results(&self, date: NaiveDate, game_ids: &[String]) -> Result<HashMap<String, GameResult>> {
        let statuses: HashMap<String, (bool, bool)> = self
            .mlb
            .schedule(date)
            .await?
            .into_iter()
            .map(|g| {
                let status = (g.is_final(), g.is_called_off());
                (g.id, status)
            })
            .collect();

        let fetched: Vec<(String, Option<GameResult>)> = stream::iter(game_ids.iter().cloned())
            .map(|id| {
                let (completed, called_off) = statuses.get(&id).copied().unwrap_or((false, false));
                async move {
                    if called_off && !completed {
                        return (id, Some(GameResult::called_off()));
                    }
                    if !completed {
                        return (id, None);
                    }
                    match self.mlb.boxscore_stats(&id).await {
                        Ok(lines) => {
                            let players = lines
                                .into_iter()
                                .map(|(pid, l)| {
                                    (
                                        pid,
                                        PlayerStats {
                                            name: l.name,
                                            home_runs: l.home_runs,
                                            stolen_bases: l.stolen_bases,
                                            hits: l.hits,
                                            goals: 0,
                                        },
                                    )
                                })
                                .collect();
                            (
                                id,
                                Some(GameResult {
                                    completed,
                                    players,
                                    ..Default::default()
                                }),
                            )
                        }
                        Err(e) => {
                            warn!("Box score unavailable for game {}: {:#}", id, e);
                            (id, None)
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        Ok(fetched
            .into_iter()
            .filter_map(|(id, r)| r.map(|r| (id, r)))
            .collect())
    }

    async fn soccer_results(&self, game_ids: &[String]) -> Result<HashMap<String, GameResult>> {
        let league = default_league(Sport::Soccer).espn_league;
        let fetched: Vec<(String, Option<GameResult>)> = stream::iter(game_ids.iter().cloned())
            .map(|id| async move {
                match self.espn.soccer_scorers(league, &id).await {
                    Ok(m) => {
                        let players = m
                            .scorers
                            .into_iter()
                            .map(|(pid, s)| {
                                (
                                    pid,
                                    PlayerStats {
                                        name: s.name,
                                        goals: s.goals,
                                        ..Default::default()
                                    },
                                )
                            })
                            .collect();
                        (
                            id,
                            Some(GameResult {
                                completed: m.completed,
                                called_off: m.called_off,
                                players,
                                absent_is_zero: true,
                            }),
                        )
                    }
                    Err(e) => {
                        warn!("Match summary unavailable for {}: {:#}", id, e);
                        (id, None)
                    }
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        Ok(fetched
            .into_iter()
            .filter_map(|(id, r)| r.map(|r| (id, r)))
            .collect())
    }
}

#[async_trait]
impl ResultsSource for LiveResults {
    async fn game_results(
        &self,
        date: NaiveDate,
        sport: Sport,
        game_ids: &[String],
    ) -> Result<HashMap<String, GameResult>> {
        match sport {
            Sport::Mlb => self.mlb_results(date, game_ids).await,
            Sport::Soccer => self.soccer_results(game_ids).await,
            Sport::Nfl => Ok(HashMap::new()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationParams {
    pub alpha: f64,
    pub min_samples: u32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            min_samples: 10,
        }
    }
}

fn game_ids(daily: &DailyPicks) -> Vec<String> {
    let mut seen = HashSet::new();
    daily
        .picks
        .iter()
        .filter(|p| seen.insert(p.game_id.clone()))
        .map(|p| p.game_id.clone())
        .collect()
}

/// Grade a saved day and update calibration.
///
/// Errors with `StoreError::NotFound` when no picks were saved for `date`.
pub async fn backfill(
    store: &dyn PicksStore,
    results: &dyn ResultsSource,
    date: NaiveDate,
    params: CalibrationParams,
) -> Result<BackfillSummary> {
    let daily = store.load_daily(date).await?.ok_or_else(|| StoreError::NotFound {
        kind: "daily picks",
        key: date.to_string(),
    })?;

    if let Some(existing) = store.load_graded(date).await? {
        if existing.calibrated {
            info!("Picks for {} already graded and calibrated, skipping", date);
            let mut summary = BackfillSummary::from_graded(date, &existing.picks);
            summary.calibrated = true;
            summary.already_graded = true;
            return Ok(summary);
        }
    }

    let ids = game_ids(&daily);
    let game_results = results.game_results(date, daily.sport, &ids).await?;
    let pending = ids
        .iter()
        .filter(|id| !game_results.get(*id).map(GameResult::decided).unwrap_or(false))
        .count();

    let graded = grade_picks(&daily.picks, &game_results);
    let mut summary = BackfillSummary::from_graded(date, &graded);

    if pending == 0 {
        // The table remembers absorbed days, so a failed graded write below
        // can be retried without counting the day twice
        let mut table: CalibrationTable = store.load_calibration().await?;
        match table.absorb_day(date, &graded, params.alpha, params.min_samples) {
            Some(moved) => {
                summary.calibration_updated = moved;
                store.save_calibration(&table).await?;
            }
            None => info!("Calibration already holds {}, not absorbing again", date),
        }
        summary.calibrated = true;
    } else {
        warn!(
            "{} of {} games for {} not final, calibration deferred",
            pending,
            ids.len(),
            date
        );
    }

    store
        .save_graded(&GradedDay {
            date,
            graded_at: Utc::now(),
            run_id: daily.run_id,
            picks: graded,
            calibrated: summary.calibrated,
        })
        .await?;

    info!(
        "Backfill {}: {} hits, {} misses, {} void, {:+.2}u",
        date, summary.hits, summary.misses, summary.voids, summary.units_profit
    );
    Ok(summary)
}

/// Every graded pick on record, oldest day first
pub async fn graded_history(store: &dyn PicksStore) -> Result<Vec<GradedPick>> {
    let mut all = Vec::new();
    for date in store.list_dates().await? {
        if let Some(day) = store.load_graded(date).await? {
            all.extend(day.picks);
        }
    }
    Ok(all)
}

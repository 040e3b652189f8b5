//! Daily picks pipeline.
//!
//! schedule -> per-game contexts -> odds -> score -> blend/calibrate ->
//! select -> round robin. Upstream failures for one game or player skip
//! that game or player; only a failed schedule fails the run.

use crate::clients::{EspnClient, LineupEntry, MlbStatsClient, OddsApiClient, QuoteBook, Side};
use crate::league_config::{default_league, LeagueConfig};
use crate::models::{DailyPicks, Game, Pick, PitcherProfile, PropMarket, Sport};
use crate::probability::{PropContext, PropModelRegistry, PropSubject};
use crate::round_robin::plan_best_round_robin;
use crate::selection::{select_picks, Candidate, SelectionParams};
use crate::store::PicksStore;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub selection: SelectionParams,
    pub round_robin_units: f64,
    pub round_robin_size: usize,
    /// Best picks (by score, across markets) fed into the round robin
    pub round_robin_pool: usize,
    /// Concurrent per-game fetches
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            selection: SelectionParams::default(),
            round_robin_units: 10.0,
            round_robin_size: 2,
            round_robin_pool: 6,
            concurrency: 8,
        }
    }
}

pub struct PicksPipeline {
    mlb: MlbStatsClient,
    espn: EspnClient,
    odds: Option<OddsApiClient>,
    registry: PropModelRegistry,
    store: Arc<dyn PicksStore>,
    config: PipelineConfig,
}

impl PicksPipeline {
    pub fn new(
        mlb: MlbStatsClient,
        espn: EspnClient,
        odds: Option<OddsApiClient>,
        registry: PropModelRegistry,
        store: Arc<dyn PicksStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            mlb,
            espn,
            odds,
            registry,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn PicksStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the day's picks without persisting them
    pub async fn generate(&self, date: NaiveDate, sport: Sport) -> Result<DailyPicks> {
        let run_id = uuid::Uuid::new_v4();
        let league = default_league(sport);
        info!("Generating {} picks for {} (run {})", sport, date, run_id);

        let games = self.schedule(date, sport, league).await?;
        let mut daily = DailyPicks {
            date,
            sport,
            generated_at: Utc::now(),
            run_id,
            games: games.len(),
            picks: Vec::new(),
            round_robin: None,
        };

        let markets = sport.prop_markets();
        if markets.is_empty() {
            info!("{} games on the {} schedule; no prop models for {}", games.len(), date, sport);
            return Ok(daily);
        }
        let games: Vec<Game> = games.into_iter().filter(|g| !g.is_final()).collect();
        if games.is_empty() {
            info!("No open {} games on {}", sport, date);
            return Ok(daily);
        }

        let contexts = match sport {
            Sport::Mlb => self.mlb_contexts(&games, date.year(), markets).await,
            Sport::Soccer => self.soccer_contexts(&games, league).await,
            Sport::Nfl => Vec::new(),
        };
        debug!("{} prop contexts across {} games", contexts.len(), games.len());

        let quotes = self.quotes(&games, league, markets).await;

        let scored = self.registry.score_batch(contexts);
        let candidates: Vec<Candidate> = scored
            .into_iter()
            .map(|scored| {
                let quote = quotes
                    .get(scored.ctx.market, scored.ctx.subject.player_name())
                    .cloned();
                Candidate { scored, quote }
            })
            .collect();

        let calibration = self
            .store
            .load_calibration()
            .await
            .context("Loading calibration table")?;
        daily.picks = select_picks(candidates, &calibration, &self.config.selection);
        daily.round_robin = self.round_robin(&daily.picks);

        info!(
            "{} picks from {} games for {} ({} priced)",
            daily.picks.len(),
            daily.games,
            date,
            daily.picks.iter().filter(|p| p.american_odds.is_some()).count()
        );
        Ok(daily)
    }

    /// Generate and persist
    pub async fn save_daily(&self, date: NaiveDate, sport: Sport) -> Result<DailyPicks> {
        let daily = self.generate(date, sport).await?;
        self.store
            .save_daily(&daily)
            .await
            .with_context(|| format!("Saving picks for {}", date))?;
        Ok(daily)
    }

    async fn schedule(&self, date: NaiveDate, sport: Sport, league: &LeagueConfig) -> Result<Vec<Game>> {
        match sport {
            Sport::Mlb => self.mlb.schedule(date).await,
            Sport::Nfl | Sport::Soccer => {
                self.espn
                    .scoreboard(league.espn_sport, league.espn_league, date)
                    .await
            }
        }
    }

    fn round_robin(&self, picks: &[Pick]) -> Option<crate::models::RoundRobinPlan> {
        let size = self.config.round_robin_size;
        if size == 0 || picks.len() < size {
            return None;
        }
        let pool_size = self.config.round_robin_pool.max(size);

        match plan_best_round_robin(picks, pool_size, size, self.config.round_robin_units) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!("Round robin skipped: {:#}", e);
                None
            }
        }
    }

    async fn mlb_contexts(&self, games: &[Game], season: i32, markets: &[PropMarket]) -> Vec<PropContext> {
        let per_game: Vec<Vec<PropContext>> = stream::iter(games.iter().cloned())
            .map(|game| async move {
                match self.mlb_game_contexts(&game, season, markets).await {
                    Ok(ctxs) => ctxs,
                    Err(e) => {
                        warn!("Skipping game {} ({}): {:#}", game.id, game.matchup(), e);
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        let mut contexts: Vec<PropContext> = per_game.into_iter().flatten().collect();
        // buffer_unordered completes out of order
        contexts.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        contexts
    }

    async fn mlb_game_contexts(
        &self,
        game: &Game,
        season: i32,
        markets: &[PropMarket],
    ) -> Result<Vec<PropContext>> {
        let home_lineup = self.lineup_or_empty(game, Side::Home).await;
        let away_lineup = self.lineup_or_empty(game, Side::Away).await;

        let ids: Vec<u64> = home_lineup
            .iter()
            .chain(away_lineup.iter())
            .map(|e| e.player_id)
            .collect();
        if ids.is_empty() {
            warn!("No hitters found for game {}", game.id);
            return Ok(Vec::new());
        }
        let profiles = self.mlb.batter_season(&ids, season).await?;

        // Home hitters face the away starter and vice versa
        let home_faces = self.pitcher_or_none(game.away_probable.as_ref().map(|p| p.id), season).await;
        let away_faces = self.pitcher_or_none(game.home_probable.as_ref().map(|p| p.id), season).await;

        let mut contexts = Vec::new();
        for (lineup, opposing) in [(&home_lineup, &home_faces), (&away_lineup, &away_faces)] {
            for entry in lineup {
                let Some(profile) = profiles.get(&entry.player_id) else {
                    debug!("No season line for {} ({})", entry.name, entry.player_id);
                    continue;
                };
                let mut batter = profile.clone();
                batter.team_abbr = entry.team_abbr.clone();
                batter.lineup_slot = entry.slot;
                if batter.name.is_empty() {
                    batter.name = entry.name.clone();
                }
                for &market in markets {
                    contexts.push(PropContext {
                        market,
                        game_id: game.id.clone(),
                        matchup: game.matchup(),
                        venue: game.venue.clone(),
                        subject: PropSubject::Batter {
                            batter: batter.clone(),
                            opposing_pitcher: opposing.clone(),
                        },
                    });
                }
            }
        }
        Ok(contexts)
    }

    async fn lineup_or_empty(&self, game: &Game, side: Side) -> Vec<LineupEntry> {
        match self.mlb.lineup(game, side).await {
            Ok(lineup) => lineup,
            Err(e) => {
                warn!("Lineup unavailable for game {} ({:?}): {:#}", game.id, side, e);
                Vec::new()
            }
        }
    }

    async fn pitcher_or_none(&self, id: Option<u64>, season: i32) -> Option<PitcherProfile> {
        let id = id?;
        match self.mlb.pitcher_season(id, season).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Pitcher {} season line unavailable: {:#}", id, e);
                None
            }
        }
    }

    async fn soccer_contexts(&self, games: &[Game], league: &LeagueConfig) -> Vec<PropContext> {
        let per_game: Vec<Vec<PropContext>> = stream::iter(games.iter().cloned())
            .map(|game| async move {
                let mut contexts = Vec::new();
                for team in [&game.home, &game.away] {
                    let squad = match self.espn.soccer_squad(league.espn_league, team).await {
                        Ok(squad) => squad,
                        Err(e) => {
                            warn!("Squad unavailable for {} in {}: {:#}", team.name, game.id, e);
                            continue;
                        }
                    };
                    for scorer in squad {
                        contexts.push(PropContext {
                            market: PropMarket::AnytimeGoal,
                            game_id: game.id.clone(),
                            matchup: game.matchup(),
                            venue: game.venue.clone(),
                            subject: PropSubject::Scorer {
                                scorer,
                                opponent_goals_against_per_game: None,
                            },
                        });
                    }
                }
                contexts
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        let mut contexts: Vec<PropContext> = per_game.into_iter().flatten().collect();
        contexts.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        contexts
    }

    /// Best quotes for every game with a matching odds event
    async fn quotes(&self, games: &[Game], league: &LeagueConfig, markets: &[PropMarket]) -> QuoteBook {
        let Some(odds) = &self.odds else {
            debug!("No odds API key configured, using model probabilities only");
            return QuoteBook::new();
        };

        let events = match odds.events(league.odds_sport_key).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Odds events unavailable for {}: {:#}", league.odds_sport_key, e);
                return QuoteBook::new();
            }
        };

        let matched: Vec<String> = games
            .iter()
            .filter_map(|g| events.iter().find(|e| e.matches_game(g)).map(|e| e.id.clone()))
            .collect();
        debug!("{} of {} games matched to odds events", matched.len(), games.len());

        let books: Vec<QuoteBook> = stream::iter(matched)
            .map(|event_id| async move {
                match odds.player_props(league.odds_sport_key, &event_id, markets).await {
                    Ok(book) => book,
                    Err(e) => {
                        warn!("Props unavailable for event {}: {:#}", event_id, e);
                        QuoteBook::new()
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut merged = QuoteBook::new();
        for book in books {
            merged.merge(book);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientSettings;
    use crate::models::{Tier, RoundRobinPlan};
    use crate::store::LocalJsonStore;
    use std::time::Duration;

    fn pick(name: &str, score: f64) -> Pick {
        Pick {
            game_id: "g".to_string(),
            matchup: "A @ B".to_string(),
            market: PropMarket::HomeRun,
            player_id: name.to_string(),
            player_name: name.to_string(),
            team_abbr: "B".to_string(),
            model_prob: score,
            market_prob: None,
            blended_prob: score,
            calibrated_prob: score,
            american_odds: Some(300),
            book: None,
            edge: None,
            expected_value: None,
            score,
            tier: Tier::Solid,
            reasons: Vec::new(),
        }
    }

    fn offline_pipeline(dir: &std::path::Path) -> PicksPipeline {
        // Unroutable base URLs; these tests never reach the network
        let settings = ClientSettings {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        PicksPipeline::new(
            MlbStatsClient::with_base_url("http://127.0.0.1:9", &settings),
            EspnClient::with_base_url("http://127.0.0.1:9", &settings),
            None,
            PropModelRegistry::default(),
            Arc::new(LocalJsonStore::new(dir)),
            PipelineConfig::default(),
        )
    }

    #[test]
    fn test_round_robin_uses_best_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = offline_pipeline(dir.path());
        let picks: Vec<Pick> = (0..10).map(|i| pick(&format!("P{}", i), 0.1 + i as f64 * 0.02)).collect();

        let plan: RoundRobinPlan = pipeline.round_robin(&picks).unwrap();
        // Pool of 6 by 2 = 15 tickets
        assert_eq!(plan.tickets.len(), 15);
        assert!((plan.units_per_ticket - 0.65).abs() < 1e-9);
        // Legs point at the six best picks in the list as saved
        assert!(plan.tickets.iter().flat_map(|t| &t.legs).all(|&i| i >= 4));
        assert_eq!(plan.tickets[0].legs, vec![9, 8]);
    }

    #[test]
    fn test_round_robin_needs_enough_picks() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = offline_pipeline(dir.path());
        assert!(pipeline.round_robin(&[pick("Solo", 0.3)]).is_none());
    }

    #[tokio::test]
    async fn test_schedule_failure_fails_generate() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = offline_pipeline(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(pipeline.generate(date, Sport::Mlb).await.is_err());
        assert!(pipeline.store().load_daily(date).await.unwrap().is_none());
    }
}

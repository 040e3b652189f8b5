//! Prop Probability Models
//!
//! Defines the PropModel trait that allows pluggable per-market probability
//! models, and the registry that dispatches a context to the right one.

use crate::models::{BatterProfile, PitcherProfile, PropMarket, ScorerProfile};
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod anytime_goal;
pub mod blend;
pub mod hits;
pub mod home_run;
pub mod math;
pub mod stolen_base;

/// Lowest and highest probability any model may report
pub const MIN_PROB: f64 = 0.001;
pub const MAX_PROB: f64 = 0.95;

#[inline]
pub fn clamp_prob(p: f64) -> f64 {
    if p.is_nan() {
        return MIN_PROB;
    }
    p.clamp(MIN_PROB, MAX_PROB)
}

/// League baselines and shrinkage weights used by the models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParams {
    pub league_hr_per_pa: f64,
    pub hr_prior_pa: f64,
    pub pitcher_prior_bf: f64,
    pub pitcher_factor_min: f64,
    pub pitcher_factor_max: f64,
    pub platoon_same_hand: f64,
    pub platoon_opposite_hand: f64,

    pub league_on_base: f64,
    pub on_base_prior_pa: f64,
    pub league_sb_attempt_rate: f64,
    pub sb_attempt_prior: f64,
    pub league_sb_success: f64,
    pub sb_success_prior: f64,

    pub league_avg: f64,
    pub avg_prior_ab: f64,
    pub pitcher_prior_ab: f64,
    pub hits_factor_min: f64,
    pub hits_factor_max: f64,
    pub league_walk_rate: f64,

    pub league_goals_per90: f64,
    pub goal_prior_minutes: f64,
    pub penalty_taker_bonus: f64,
    pub league_goals_against_per_game: f64,
    pub opponent_factor_min: f64,
    pub opponent_factor_max: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            league_hr_per_pa: 0.031,
            hr_prior_pa: 200.0,
            pitcher_prior_bf: 300.0,
            pitcher_factor_min: 0.6,
            pitcher_factor_max: 1.6,
            platoon_same_hand: 0.95,
            platoon_opposite_hand: 1.05,

            league_on_base: 0.315,
            on_base_prior_pa: 100.0,
            league_sb_attempt_rate: 0.07,
            sb_attempt_prior: 60.0,
            league_sb_success: 0.75,
            sb_success_prior: 20.0,

            league_avg: 0.245,
            avg_prior_ab: 150.0,
            pitcher_prior_ab: 300.0,
            hits_factor_min: 0.8,
            hits_factor_max: 1.2,
            league_walk_rate: 0.085,

            league_goals_per90: 0.12,
            goal_prior_minutes: 900.0,
            penalty_taker_bonus: 0.04,
            league_goals_against_per_game: 1.35,
            opponent_factor_min: 0.7,
            opponent_factor_max: 1.4,
        }
    }
}

/// Who the prop is about, with whatever matchup data was available
#[derive(Debug, Clone)]
pub enum PropSubject {
    Batter {
        batter: BatterProfile,
        opposing_pitcher: Option<PitcherProfile>,
    },
    Scorer {
        scorer: ScorerProfile,
        opponent_goals_against_per_game: Option<f64>,
    },
}

impl PropSubject {
    pub fn player_id(&self) -> String {
        match self {
            PropSubject::Batter { batter, .. } => batter.player_id.to_string(),
            PropSubject::Scorer { scorer, .. } => scorer.player_id.clone(),
        }
    }

    pub fn player_name(&self) -> &str {
        match self {
            PropSubject::Batter { batter, .. } => &batter.name,
            PropSubject::Scorer { scorer, .. } => &scorer.name,
        }
    }

    pub fn team_abbr(&self) -> &str {
        match self {
            PropSubject::Batter { batter, .. } => &batter.team_abbr,
            PropSubject::Scorer { scorer, .. } => &scorer.team_abbr,
        }
    }
}

/// Everything a model needs to price one player prop
#[derive(Debug, Clone)]
pub struct PropContext {
    pub market: PropMarket,
    pub game_id: String,
    pub matchup: String,
    pub venue: Option<String>,
    pub subject: PropSubject,
}

/// Per-market probability model
pub trait PropModel: Send + Sync {
    /// Probability the prop cashes, in [MIN_PROB, MAX_PROB]
    fn estimate(&self, ctx: &PropContext, params: &ScoringParams) -> Result<f64>;

    /// Check if this model prices the given market
    fn supports(&self, market: PropMarket) -> bool;

    /// Model name for logging and debugging
    fn model_name(&self) -> &str;
}

/// Manages the prop models and selects one by market.
pub struct PropModelRegistry {
    models: Vec<Box<dyn PropModel>>,
    params: ScoringParams,
}

/// A context together with its model probability
#[derive(Debug, Clone)]
pub struct ScoredProp {
    pub ctx: PropContext,
    pub model_prob: f64,
}

impl PropModelRegistry {
    /// Create a new registry with the default models
    pub fn new(params: ScoringParams) -> Self {
        let models: Vec<Box<dyn PropModel>> = vec![
            Box::new(home_run::HomeRunModel),
            Box::new(stolen_base::StolenBaseModel),
            Box::new(hits::TwoPlusHitsModel),
            Box::new(anytime_goal::AnytimeGoalModel),
        ];
        Self { models, params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Estimate using the first model that supports the context's market
    pub fn estimate(&self, ctx: &PropContext) -> Result<f64> {
        let model = self
            .models
            .iter()
            .find(|m| m.supports(ctx.market))
            .ok_or_else(|| anyhow!("No prop model found for market: {}", ctx.market.key()))?;

        let p = model.estimate(ctx, &self.params)?;
        if !p.is_finite() {
            return Err(anyhow!(
                "{} produced a non-finite probability for {}",
                model.model_name(),
                ctx.subject.player_name()
            ));
        }
        Ok(clamp_prob(p))
    }

    /// Score many contexts in parallel. Failures are logged and dropped.
    pub fn score_batch(&self, contexts: Vec<PropContext>) -> Vec<ScoredProp> {
        contexts
            .into_par_iter()
            .filter_map(|ctx| match self.estimate(&ctx) {
                Ok(model_prob) => Some(ScoredProp { ctx, model_prob }),
                Err(e) => {
                    warn!(
                        "Skipping {} {} ({}): {}",
                        ctx.subject.player_name(),
                        ctx.market.key(),
                        ctx.game_id,
                        e
                    );
                    None
                }
            })
            .collect()
    }

    /// Add a custom model; it takes precedence over the defaults
    pub fn register_model(&mut self, model: Box<dyn PropModel>) {
        self.models.insert(0, model);
    }
}

impl Default for PropModelRegistry {
    fn default() -> Self {
        Self::new(ScoringParams::default())
    }
}

/// Pull the batter subject out of a context or fail for the wrong kind
pub(crate) fn batter_subject(ctx: &PropContext) -> Result<(&BatterProfile, Option<&PitcherProfile>)> {
    match &ctx.subject {
        PropSubject::Batter {
            batter,
            opposing_pitcher,
        } => Ok((batter, opposing_pitcher.as_ref())),
        PropSubject::Scorer { .. } => Err(anyhow!(
            "{} needs a batter subject",
            ctx.market.key()
        )),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_registry_dispatches_every_market() {
        let registry = PropModelRegistry::default();
        for market in [PropMarket::HomeRun, PropMarket::StolenBase, PropMarket::TwoPlusHits] {
            let ctx = batter_ctx(market, batter(400, 15), None);
            let p = registry.estimate(&ctx).unwrap();
            assert!((MIN_PROB..=MAX_PROB).contains(&p), "{:?} -> {}", market, p);
        }
    }

    #[test]
    fn test_wrong_subject_is_an_error() {
        let registry = PropModelRegistry::default();
        let ctx = batter_ctx(PropMarket::AnytimeGoal, batter(400, 15), None);
        assert!(registry.estimate(&ctx).is_err());
    }

    #[test]
    fn test_score_batch_drops_failures() {
        let registry = PropModelRegistry::default();
        let good = batter_ctx(PropMarket::HomeRun, batter(400, 15), None);
        let bad = batter_ctx(PropMarket::AnytimeGoal, batter(400, 15), None);
        let scored = registry.score_batch(vec![good, bad]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].ctx.market, PropMarket::HomeRun);
    }

    #[test]
    fn test_clamp_prob() {
        assert_eq!(clamp_prob(2.0), MAX_PROB);
        assert_eq!(clamp_prob(-1.0), MIN_PROB);
        assert_eq!(clamp_prob(f64::NAN), MIN_PROB);
    }
}

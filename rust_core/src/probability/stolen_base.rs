//! Stolen base (1+) model.
//!
//! Expected steals per game = PA x on-base rate x attempts per time on
//! first x success rate. Each rate is shrunk toward league average; the
//! per-game probability treats steals as Poisson.

use super::math::{expected_plate_appearances, poisson_at_least_one, shrink_rate};
use super::{batter_subject, PropContext, PropModel, ScoringParams};
use crate::models::{BatterProfile, PropMarket};
use anyhow::Result;

/// Expected steals for one game
pub fn expected_steals(batter: &BatterProfile, params: &ScoringParams) -> f64 {
    let on_base = shrink_rate(
        (batter.hits + batter.walks + batter.hit_by_pitch) as f64,
        batter.plate_appearances as f64,
        params.league_on_base,
        params.on_base_prior_pa,
    );
    let attempt_rate = shrink_rate(
        batter.steal_attempts() as f64,
        batter.times_on_first() as f64,
        params.league_sb_attempt_rate,
        params.sb_attempt_prior,
    );
    let success = shrink_rate(
        batter.stolen_bases as f64,
        batter.steal_attempts() as f64,
        params.league_sb_success,
        params.sb_success_prior,
    );

    expected_plate_appearances(batter.lineup_slot) * on_base * attempt_rate * success
}

pub struct StolenBaseModel;

impl PropModel for StolenBaseModel {
    fn estimate(&self, ctx: &PropContext, params: &ScoringParams) -> Result<f64> {
        let (batter, _) = batter_subject(ctx)?;
        Ok(poisson_at_least_one(expected_steals(batter, params)))
    }

    fn supports(&self, market: PropMarket) -> bool {
        market == PropMarket::StolenBase
    }

    fn model_name(&self) -> &str {
        "StolenBase"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn speedster() -> BatterProfile {
        BatterProfile {
            plate_appearances: 600,
            at_bats: 530,
            hits: 150,
            home_runs: 10,
            walks: 60,
            hit_by_pitch: 5,
            stolen_bases: 40,
            caught_stealing: 5,
            lineup_slot: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_speedster_probability_in_range() {
        let ctx = batter_ctx(PropMarket::StolenBase, speedster(), None);
        let p = StolenBaseModel.estimate(&ctx, &ScoringParams::default()).unwrap();
        assert!(p > 0.18 && p < 0.30, "speedster {}", p);
    }

    #[test]
    fn test_non_runner_is_unlikely() {
        let mut slow = speedster();
        slow.stolen_bases = 0;
        slow.caught_stealing = 0;
        let ctx = batter_ctx(PropMarket::StolenBase, slow, None);
        let p = StolenBaseModel.estimate(&ctx, &ScoringParams::default()).unwrap();
        assert!(p < 0.05, "slow {}", p);
    }

    #[test]
    fn test_lower_lineup_slot_reduces_chances() {
        let params = ScoringParams::default();
        let top = expected_steals(&speedster(), &params);
        let mut ninth = speedster();
        ninth.lineup_slot = Some(9);
        assert!(expected_steals(&ninth, &params) < top);
    }

    #[test]
    fn test_supports_only_stolen_base() {
        let ctx = batter_ctx(PropMarket::StolenBase, batter(100, 1), None);
        assert!(StolenBaseModel.supports(ctx.market));
        assert!(!StolenBaseModel.supports(PropMarket::HomeRun));
    }
}

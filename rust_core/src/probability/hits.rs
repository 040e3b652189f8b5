//! 2+ hits model.
//!
//! Per-AB hit rate from shrunk batting average, scaled by how hittable the
//! starter is, then a binomial tail over expected at-bats.

use super::math::{binomial_at_least_frac, expected_plate_appearances, shrink_rate};
use super::{batter_subject, PropContext, PropModel, ScoringParams};
use crate::models::{BatterProfile, PitcherProfile, PropMarket};
use anyhow::Result;

/// Expected official at-bats: plate appearances less walks and HBP
pub fn expected_at_bats(batter: &BatterProfile, params: &ScoringParams) -> f64 {
    let free_passes = shrink_rate(
        (batter.walks + batter.hit_by_pitch) as f64,
        batter.plate_appearances as f64,
        params.league_walk_rate,
        params.on_base_prior_pa,
    );
    expected_plate_appearances(batter.lineup_slot) * (1.0 - free_passes)
}

fn hittable_factor(pitcher: Option<&PitcherProfile>, params: &ScoringParams) -> f64 {
    let Some(p) = pitcher else {
        return 1.0;
    };
    let baa = shrink_rate(
        p.hits_allowed as f64,
        p.at_bats_against as f64,
        params.league_avg,
        params.pitcher_prior_ab,
    );
    (baa / params.league_avg).clamp(params.hits_factor_min, params.hits_factor_max)
}

pub struct TwoPlusHitsModel;

impl PropModel for TwoPlusHitsModel {
    fn estimate(&self, ctx: &PropContext, params: &ScoringParams) -> Result<f64> {
        let (batter, pitcher) = batter_subject(ctx)?;

        let avg = shrink_rate(
            batter.hits as f64,
            batter.at_bats as f64,
            params.league_avg,
            params.avg_prior_ab,
        );
        let per_ab = (avg * hittable_factor(pitcher, params)).clamp(0.0, 1.0);

        Ok(binomial_at_least_frac(
            ctx.market.threshold(),
            expected_at_bats(batter, params),
            per_ab,
        ))
    }

    fn supports(&self, market: PropMarket) -> bool {
        market == PropMarket::TwoPlusHits
    }

    fn model_name(&self) -> &str {
        "TwoPlusHits"
    }
}

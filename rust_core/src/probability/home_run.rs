//! Home run (1+) model.
//!
//! Per-PA home run rate, shrunk toward league average, adjusted for the
//! opposing starter, the park and the platoon split, then converted to a
//! per-game probability through expected plate appearances.

use super::math::{expected_plate_appearances, per_pa_to_per_game, shrink_rate};
use super::{batter_subject, PropContext, PropModel, ScoringParams};
use crate::models::{Hand, PitcherProfile, PropMarket};
use anyhow::Result;

/// Home run park factors, 1.0 = neutral
static PARK_FACTORS: &[(&str, f64)] = &[
    ("Coors Field", 1.28),
    ("Great American Ball Park", 1.22),
    ("Yankee Stadium", 1.16),
    ("Citizens Bank Park", 1.12),
    ("Dodger Stadium", 1.08),
    ("Globe Life Field", 1.06),
    ("Fenway Park", 0.97),
    ("Comerica Park", 0.90),
    ("T-Mobile Park", 0.90),
    ("Petco Park", 0.92),
    ("loanDepot park", 0.88),
    ("Kauffman Stadium", 0.85),
    ("Oracle Park", 0.82),
];

pub fn park_factor(venue: Option<&str>) -> f64 {
    venue
        .and_then(|v| {
            PARK_FACTORS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(v))
                .map(|(_, f)| *f)
        })
        .unwrap_or(1.0)
}

/// Batter-vs-pitcher handedness multiplier
pub fn platoon_factor(bats: Option<Hand>, throws: Option<Hand>, params: &ScoringParams) -> f64 {
    match (bats, throws) {
        (Some(Hand::S), _) | (None, _) | (_, None) => 1.0,
        (Some(b), Some(t)) if b == t => params.platoon_same_hand,
        _ => params.platoon_opposite_hand,
    }
}

/// How much more (or less) HR-prone the starter is than league average
fn pitcher_factor(pitcher: Option<&PitcherProfile>, params: &ScoringParams) -> f64 {
    let Some(p) = pitcher else {
        return 1.0;
    };
    let rate = shrink_rate(
        p.home_runs_allowed as f64,
        p.batters_faced as f64,
        params.league_hr_per_pa,
        params.pitcher_prior_bf,
    );
    (rate / params.league_hr_per_pa).clamp(params.pitcher_factor_min, params.pitcher_factor_max)
}

pub struct HomeRunModel;

impl PropModel for HomeRunModel {
    fn estimate(&self, ctx: &PropContext, params: &ScoringParams) -> Result<f64> {
        let (batter, pitcher) = batter_subject(ctx)?;

        let base = shrink_rate(
            batter.home_runs as f64,
            batter.plate_appearances as f64,
            params.league_hr_per_pa,
            params.hr_prior_pa,
        );

        let per_pa = base
            * pitcher_factor(pitcher, params)
            * park_factor(ctx.venue.as_deref())
            * platoon_factor(batter.bats, pitcher.and_then(|p| p.throws), params);

        let pa = expected_plate_appearances(batter.lineup_slot);
        Ok(per_pa_to_per_game(per_pa, pa))
    }

    fn supports(&self, market: PropMarket) -> bool {
        market == PropMarket::HomeRun
    }

    fn model_name(&self) -> &str {
        "HomeRun"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn estimate(ctx: &PropContext) -> f64 {
        HomeRunModel.estimate(ctx, &ScoringParams::default()).unwrap()
    }

    #[test]
    fn test_power_hitter_beats_slap_hitter() {
        let slugger = estimate(&batter_ctx(PropMarket::HomeRun, batter(500, 35), None));
        let slap = estimate(&batter_ctx(PropMarket::HomeRun, batter(500, 3), None));
        assert!(slugger > slap);
        assert!(slugger > 0.15 && slugger < 0.35, "slugger {}", slugger);
    }

    #[test]
    fn test_no_history_falls_back_to_league_rate() {
        let p = estimate(&batter_ctx(PropMarket::HomeRun, batter(0, 0), None));
        let expected = per_pa_to_per_game(0.031, expected_plate_appearances(Some(4)));
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn test_coors_boosts() {
        let mut ctx = batter_ctx(PropMarket::HomeRun, batter(500, 20), None);
        let neutral = estimate(&ctx);
        ctx.venue = Some("Coors Field".to_string());
        assert!(estimate(&ctx) > neutral);
        ctx.venue = Some("Oracle Park".to_string());
        assert!(estimate(&ctx) < neutral);
    }

    #[test]
    fn test_homer_prone_pitcher_raises_probability() {
        let stingy = PitcherProfile {
            batters_faced: 600,
            home_runs_allowed: 8,
            ..Default::default()
        };
        let prone = PitcherProfile {
            batters_faced: 600,
            home_runs_allowed: 30,
            ..Default::default()
        };
        let a = estimate(&batter_ctx(PropMarket::HomeRun, batter(500, 20), Some(stingy)));
        let b = estimate(&batter_ctx(PropMarket::HomeRun, batter(500, 20), Some(prone)));
        assert!(b > a);
    }

    #[test]
    fn test_platoon_factor() {
        let params = ScoringParams::default();
        assert_eq!(platoon_factor(Some(Hand::L), Some(Hand::R), &params), 1.05);
        assert_eq!(platoon_factor(Some(Hand::R), Some(Hand::R), &params), 0.95);
        assert_eq!(platoon_factor(Some(Hand::S), Some(Hand::R), &params), 1.0);
        assert_eq!(platoon_factor(None, Some(Hand::R), &params), 1.0);
    }
}

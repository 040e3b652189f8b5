//! Anytime goalscorer model (soccer).

use super::math::{poisson_at_least_one, shrink_rate};
use super::{PropContext, PropModel, PropSubject, ScoringParams};
use crate::models::{PropMarket, ScorerProfile};
use anyhow::{anyhow, Result};

/// Minutes we expect the player to log in this match
pub fn expected_minutes(scorer: &ScorerProfile) -> f64 {
    if let Some(m) = scorer.expected_minutes {
        return m.clamp(0.0, 95.0);
    }
    if scorer.appearances == 0 {
        return 60.0;
    }
    (scorer.minutes as f64 / scorer.appearances as f64).clamp(0.0, 95.0)
}

pub struct AnytimeGoalModel;

impl PropModel for AnytimeGoalModel {
    fn estimate(&self, ctx: &PropContext, params: &ScoringParams) -> Result<f64> {
        let PropSubject::Scorer {
            scorer,
            opponent_goals_against_per_game,
        } = &ctx.subject
        else {
            return Err(anyhow!("anytime_goal needs a scorer subject"));
        };

        // Goals per minute, shrunk, then scaled to a 90
        let per_minute = shrink_rate(
            scorer.goals as f64,
            scorer.minutes as f64,
            params.league_goals_per90 / 90.0,
            params.goal_prior_minutes,
        );
        let per90 = per_minute * 90.0;

        let opponent = opponent_goals_against_per_game
            .map(|ga| {
                (ga / params.league_goals_against_per_game)
                    .clamp(params.opponent_factor_min, params.opponent_factor_max)
            })
            .unwrap_or(1.0);

        let mut lambda = per90 * (expected_minutes(scorer) / 90.0) * opponent;
        if scorer.penalty_taker {
            lambda += params.penalty_taker_bonus;
        }

        Ok(poisson_at_least_one(lambda))
    }

    fn supports(&self, market: PropMarket) -> bool {
        market == PropMarket::AnytimeGoal
    }

    fn model_name(&self) -> &str {
        "AnytimeGoal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(scorer: ScorerProfile, ga: Option<f64>) -> PropContext {
        PropContext {
            market: PropMarket::AnytimeGoal,
            game_id: "m1".to_string(),
            matchup: "AWY @ HOM".to_string(),
            venue: None,
            subject: PropSubject::Scorer {
                scorer,
                opponent_goals_against_per_game: ga,
            },
        }
    }

    fn striker() -> ScorerProfile {
        ScorerProfile {
            player_id: "9".to_string(),
            name: "Striker".to_string(),
            team_abbr: "HOM".to_string(),
            goals: 20,
            minutes: 2700,
            appearances: 30,
            penalty_taker: false,
            expected_minutes: None,
        }
    }

    #[test]
    fn test_striker_range() {
        let p = AnytimeGoalModel
            .estimate(&ctx(striker(), None), &ScoringParams::default())
            .unwrap();
        assert!(p > 0.40 && p < 0.55, "striker {}", p);
    }

    #[test]
    fn test_penalty_taker_and_leaky_defence_help() {
        let params = ScoringParams::default();
        let base = AnytimeGoalModel.estimate(&ctx(striker(), None), &params).unwrap();

        let mut pk = striker();
        pk.penalty_taker = true;
        assert!(AnytimeGoalModel.estimate(&ctx(pk, None), &params).unwrap() > base);

        let leaky = AnytimeGoalModel.estimate(&ctx(striker(), Some(2.2)), &params).unwrap();
        let tight = AnytimeGoalModel.estimate(&ctx(striker(), Some(0.7)), &params).unwrap();
        assert!(leaky > base && tight < base);
    }

    #[test]
    fn test_expected_minutes_defaults() {
        let mut s = striker();
        assert_eq!(expected_minutes(&s), 90.0);
        s.appearances = 0;
        assert_eq!(expected_minutes(&s), 60.0);
        s.expected_minutes = Some(120.0);
        assert_eq!(expected_minutes(&s), 95.0);
    }
}

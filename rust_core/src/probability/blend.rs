//! Model / market blending in log-odds space.

use super::clamp_prob;
use super::math::{logistic, logit};

/// Blend a model probability with the market's fair probability.
///
/// `market_weight` is the share given to the market (clamped to [0, 1]).
/// Without a market price the model probability passes through.
pub fn blend_probabilities(model: f64, market: Option<f64>, market_weight: f64) -> f64 {
    let Some(market) = market else {
        return clamp_prob(model);
    };
    let w = market_weight.clamp(0.0, 1.0);
    clamp_prob(logistic((1.0 - w) * logit(model) + w * logit(market)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_market_passes_through() {
        assert_eq!(blend_probabilities(0.2, None, 0.5), 0.2);
    }

    #[test]
    fn test_weights_at_extremes() {
        assert!((blend_probabilities(0.2, Some(0.3), 0.0) - 0.2).abs() < 1e-9);
        assert!((blend_probabilities(0.2, Some(0.3), 1.0) - 0.3).abs() < 1e-9);
        assert!((blend_probabilities(0.2, Some(0.3), 7.0) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_even_blend_is_between_inputs() {
        let p = blend_probabilities(0.10, Some(0.20), 0.5);
        assert!(p > 0.10 && p < 0.20);
        // Geometric mean of odds, not arithmetic mean of probabilities
        let odds = ((0.1f64 / 0.9) * (0.2 / 0.8)).sqrt();
        assert!((p - odds / (1.0 + odds)).abs() < 1e-9);
    }
}

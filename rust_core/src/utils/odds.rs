//! Sportsbook price conversions.
//!
//! American odds are the wire format of every book we read; everything
//! downstream works in decimal payouts or implied probabilities.

/// Convert American odds to a decimal payout (stake included).
///
/// Returns `None` for prices inside (-100, 100), which no book quotes.
pub fn american_to_decimal(american: i32) -> Option<f64> {
    if american >= 100 {
        Some(1.0 + american as f64 / 100.0)
    } else if american <= -100 {
        Some(1.0 + 100.0 / (-american) as f64)
    } else {
        None
    }
}

/// Convert a decimal payout back to American odds, rounded to the nearest integer.
pub fn decimal_to_american(decimal: f64) -> Option<i32> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return None;
    }
    if decimal >= 2.0 {
        Some(((decimal - 1.0) * 100.0).round() as i32)
    } else {
        Some((-100.0 / (decimal - 1.0)).round() as i32)
    }
}

/// Implied probability of an American price, vig included
pub fn american_to_implied(american: i32) -> Option<f64> {
    american_to_decimal(american).map(|d| 1.0 / d)
}

/// Remove the book's margin from a two-way market proportionally.
///
/// Returns the fair probability of side `a`.
pub fn no_vig_two_way(a: i32, b: i32) -> Option<f64> {
    let pa = american_to_implied(a)?;
    let pb = american_to_implied(b)?;
    let overround = pa + pb;
    if overround <= 0.0 {
        return None;
    }
    Some(pa / overround)
}

/// Expected profit per unit staked at `american` with win probability `p`
pub fn expected_value(p: f64, american: i32) -> Option<f64> {
    let decimal = american_to_decimal(american)?;
    Some(p * (decimal - 1.0) - (1.0 - p))
}

/// Edge of a model probability over the market's implied probability
#[inline]
pub fn edge(model_prob: f64, implied_prob: f64) -> f64 {
    model_prob - implied_prob
}

/// Format American odds with an explicit sign (+250, -120)
pub fn format_american(american: i32) -> String {
    if american > 0 {
        format!("+{}", american)
    } else {
        american.to_string()
    }
}

//! Closed-form probability helpers shared by the prop models.

/// Floor/ceiling used before taking log-odds
const LOGIT_EPS: f64 = 1e-6;

/// Logistic function
#[inline]
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Converts a probability to log-odds.
#[inline]
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

/// Chance of at least one success over `pa` independent trials.
///
/// `pa` may be fractional (expected plate appearances).
pub fn per_pa_to_per_game(p: f64, pa: f64) -> f64 {
    if pa <= 0.0 {
        return 0.0;
    }
    1.0 - (1.0 - p.clamp(0.0, 1.0)).powf(pa)
}

/// P(X >= k) for X ~ Binomial(n, p)
pub fn binomial_at_least(k: u32, n: u32, p: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if k > n {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let q = 1.0 - p;

    // P(X < k) by summing the pmf with a running coefficient
    let mut coeff = 1.0;
    let mut below = 0.0;
    for i in 0..k {
        if i > 0 {
            coeff *= (n - i + 1) as f64 / i as f64;
        }
        below += coeff * p.powi(i as i32) * q.powi((n - i) as i32);
    }
    (1.0 - below).clamp(0.0, 1.0)
}

/// Binomial tail for a fractional number of trials.
///
/// Linear interpolation between floor(n) and ceil(n).
pub fn binomial_at_least_frac(k: u32, n: f64, p: f64) -> f64 {
    if n <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    let lo = n.floor();
    let frac = n - lo;
    let p_lo = binomial_at_least(k, lo as u32, p);
    if frac == 0.0 {
        return p_lo;
    }
    let p_hi = binomial_at_least(k, lo as u32 + 1, p);
    p_lo + (p_hi - p_lo) * frac
}

/// P(X >= 1) for X ~ Poisson(lambda)
#[inline]
pub fn poisson_at_least_one(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 0.0;
    }
    1.0 - (-lambda).exp()
}

/// Empirical-Bayes shrinkage of an observed rate toward a league prior.
///
/// `prior_weight` is the number of pseudo-trials the prior is worth.
pub fn shrink_rate(successes: f64, trials: f64, prior_rate: f64, prior_weight: f64) -> f64 {
    let denom = trials.max(0.0) + prior_weight;
    if denom <= 0.0 {
        return prior_rate;
    }
    (successes.max(0.0) + prior_rate * prior_weight) / denom
}

/// Expected plate appearances for a lineup slot (1-9).
pub fn expected_plate_appearances(slot: Option<u8>) -> f64 {
    match slot {
        Some(s @ 1..=9) => 4.65 - 0.1 * (s - 1) as f64,
        _ => 4.1,
    }
}

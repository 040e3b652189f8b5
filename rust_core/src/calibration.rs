//! Calibration multipliers learned from graded picks.
//!
//! Each market carries a multiplier applied to the blended probability.
//! Graded outcomes accumulate until a market has enough samples, then the
//! multiplier moves toward `multiplier * (observed / predicted)` by an
//! EWMA step.

use crate::models::{GradedPick, Outcome, PropMarket};
use crate::probability::clamp_prob;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub const MULTIPLIER_MIN: f64 = 0.5;
pub const MULTIPLIER_MAX: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCalibration {
    pub multiplier: f64,
    /// Graded picks already absorbed into the multiplier
    pub samples: u64,
    #[serde(default)]
    pub brier: Option<f64>,
    #[serde(default)]
    pub log_loss: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    // Graded picks waiting for `min_samples`
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub pending_hits: u32,
    #[serde(default)]
    pub pending_prob_sum: f64,
    #[serde(default)]
    pub pending_sq_err_sum: f64,
    #[serde(default)]
    pub pending_log_loss_sum: f64,
}

impl Default for MarketCalibration {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            samples: 0,
            brier: None,
            log_loss: None,
            updated_at: None,
            pending_count: 0,
            pending_hits: 0,
            pending_prob_sum: 0.0,
            pending_sq_err_sum: 0.0,
            pending_log_loss_sum: 0.0,
        }
    }
}

impl MarketCalibration {
    fn push(&mut self, prob: f64, hit: bool) {
        let o = if hit { 1.0 } else { 0.0 };
        let p = prob.clamp(1e-6, 1.0 - 1e-6);
        self.pending_count += 1;
        if hit {
            self.pending_hits += 1;
        }
        self.pending_prob_sum += prob;
        self.pending_sq_err_sum += (prob - o).powi(2);
        self.pending_log_loss_sum -= o * p.ln() + (1.0 - o) * (1.0 - p).ln();
    }

    fn clear_pending(&mut self) {
        self.pending_count = 0;
        self.pending_hits = 0;
        self.pending_prob_sum = 0.0;
        self.pending_sq_err_sum = 0.0;
        self.pending_log_loss_sum = 0.0;
    }

    /// Fold pending picks into the multiplier. Returns false if not enough data.
    fn absorb(&mut self, alpha: f64, min_samples: u32) -> bool {
        if self.pending_count == 0 || self.pending_count < min_samples {
            return false;
        }
        let n = self.pending_count as f64;
        let mean_pred = self.pending_prob_sum / n;
        let hit_rate = self.pending_hits as f64 / n;
        let alpha = alpha.clamp(0.0, 1.0);

        if mean_pred > 0.0 {
            let target = self.multiplier * (hit_rate / mean_pred);
            self.multiplier = ((1.0 - alpha) * self.multiplier + alpha * target)
                .clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
        }

        let batch_brier = self.pending_sq_err_sum / n;
        let batch_log_loss = self.pending_log_loss_sum / n;
        self.brier = Some(ewma(self.brier, batch_brier, alpha));
        self.log_loss = Some(ewma(self.log_loss, batch_log_loss, alpha));

        self.samples += self.pending_count as u64;
        self.updated_at = Some(Utc::now());
        self.clear_pending();
        true
    }
}

#[inline]
fn ewma(prev: Option<f64>, value: f64, alpha: f64) -> f64 {
    match prev {
        Some(p) => (1.0 - alpha) * p + alpha * value,
        None => value,
    }
}

/// Persisted calibration state, keyed by market key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub markets: BTreeMap<String, MarketCalibration>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Pick dates already folded into `markets`
    #[serde(default)]
    pub absorbed_days: BTreeSet<NaiveDate>,
}

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn multiplier(&self, market: PropMarket) -> f64 {
        self.markets
            .get(market.key())
            .map(|m| m.multiplier)
            .unwrap_or(1.0)
    }

    /// Apply the market multiplier to a probability
    pub fn apply(&self, market: PropMarket, p: f64) -> f64 {
        clamp_prob(p * self.multiplier(market))
    }

    /// Absorb the graded picks of `date` unless that day is already in.
    ///
    /// `None` when the day was absorbed before, otherwise the markets whose
    /// multiplier moved.
    pub fn absorb_day(
        &mut self,
        date: NaiveDate,
        graded: &[GradedPick],
        alpha: f64,
        min_samples: u32,
    ) -> Option<Vec<PropMarket>> {
        if !self.absorbed_days.insert(date) {
            return None;
        }
        Some(self.update(graded, alpha, min_samples))
    }

    /// Absorb one day of graded picks.
    ///
    /// Returns the markets whose multiplier moved.
    pub fn update(&mut self, graded: &[GradedPick], alpha: f64, min_samples: u32) -> Vec<PropMarket> {
        let mut touched = Vec::new();
        for g in graded {
            let hit = match g.outcome {
                Outcome::Hit => true,
                Outcome::Miss => false,
                Outcome::Void => continue,
            };
            let market = g.pick.market;
            self.markets
                .entry(market.key().to_string())
                .or_default()
                .push(g.pick.calibrated_prob, hit);
            if !touched.contains(&market) {
                touched.push(market);
            }
        }

        let mut moved = Vec::new();
        for market in touched {
            let Some(cal) = self.markets.get_mut(market.key()) else {
                continue;
            };
            let before = cal.multiplier;
            if cal.absorb(alpha, min_samples) {
                info!(
                    "Calibration {}: multiplier {:.3} -> {:.3} ({} samples)",
                    market.key(),
                    before,
                    cal.multiplier,
                    cal.samples
                );
                moved.push(market);
            } else {
                debug!(
                    "Calibration {}: {} pending (< {} needed)",
                    market.key(),
                    cal.pending_count,
                    min_samples
                );
            }
        }

        if !moved.is_empty() {
            self.updated_at = Some(Utc::now());
        }
        moved
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// A bucket in the reliability curve (e.g. all picks between 0.20-0.30)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub bin_start: f64,
    pub bin_end: f64,
    pub mean_predicted: f64,
    pub actual_rate: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketReport {
    pub market: PropMarket,
    pub count: usize,
    pub hits: usize,
    pub hit_rate: f64,
    pub mean_predicted: f64,
    pub brier: f64,
    pub buckets: Vec<CalibrationBucket>,
}

/// Per-market reliability of graded picks (voids excluded)
pub fn calibration_report(graded: &[GradedPick]) -> Vec<MarketReport> {
    const BINS: usize = 10;
    let mut by_market: BTreeMap<PropMarket, Vec<(f64, bool)>> = BTreeMap::new();
    for g in graded {
        let hit = match g.outcome {
            Outcome::Hit => true,
            Outcome::Miss => false,
            Outcome::Void => continue,
        };
        by_market
            .entry(g.pick.market)
            .or_default()
            .push((g.pick.calibrated_prob, hit));
    }

    by_market
        .into_iter()
        .map(|(market, points)| {
            let n = points.len() as f64;
            let hits = points.iter().filter(|(_, h)| *h).count();
            let mean_predicted = points.iter().map(|(p, _)| p).sum::<f64>() / n;
            let brier = points
                .iter()
                .map(|(p, h)| (p - if *h { 1.0 } else { 0.0 }).powi(2))
                .sum::<f64>()
                / n;

            let mut bins: Vec<Vec<(f64, bool)>> = vec![Vec::new(); BINS];
            for &(p, h) in &points {
                let idx = ((p * BINS as f64) as usize).min(BINS - 1);
                bins[idx].push((p, h));
            }
            let buckets = bins
                .into_iter()
                .enumerate()
                .filter(|(_, b)| !b.is_empty())
                .map(|(i, b)| {
                    let count = b.len();
                    CalibrationBucket {
                        bin_start: i as f64 / BINS as f64,
                        bin_end: (i + 1) as f64 / BINS as f64,
                        mean_predicted: b.iter().map(|(p, _)| p).sum::<f64>() / count as f64,
                        actual_rate: b.iter().filter(|(_, h)| *h).count() as f64 / count as f64,
                        count,
                    }
                })
                .collect();

            MarketReport {
                market,
                count: points.len(),
                hits,
                hit_rate: hits as f64 / n,
                mean_predicted,
                brier,
                buckets,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pick, Tier};

    fn graded(market: PropMarket, prob: f64, outcome: Outcome) -> GradedPick {
        GradedPick {
            pick: Pick {
                game_id: "g".to_string(),
                matchup: "A @ B".to_string(),
                market,
                player_id: "1".to_string(),
                player_name: "P".to_string(),
                team_abbr: "B".to_string(),
                model_prob: prob,
                market_prob: None,
                blended_prob: prob,
                calibrated_prob: prob,
                american_odds: None,
                book: None,
                edge: None,
                expected_value: None,
                score: prob,
                tier: Tier::Solid,
                reasons: Vec::new(),
            },
            outcome,
            actual: None,
        }
    }

    fn day(market: PropMarket, prob: f64, hits: usize, misses: usize) -> Vec<GradedPick> {
        let mut v: Vec<GradedPick> = (0..hits).map(|_| graded(market, prob, Outcome::Hit)).collect();
        v.extend((0..misses).map(|_| graded(market, prob, Outcome::Miss)));
        v
    }

    #[test]
    fn test_absent_market_is_identity() {
        let table = CalibrationTable::new();
        assert_eq!(table.multiplier(PropMarket::HomeRun), 1.0);
        assert_eq!(table.apply(PropMarket::HomeRun, 0.2), 0.2);
    }

    #[test]
    fn test_overconfident_market_shrinks() {
        let mut table = CalibrationTable::new();
        // Predicted 20%, hit 10%
        let moved = table.update(&day(PropMarket::HomeRun, 0.2, 2, 18), 0.2, 10);
        assert_eq!(moved, vec![PropMarket::HomeRun]);
        // target = 0.5, new = 0.8*1.0 + 0.2*0.5 = 0.9
        assert!((table.multiplier(PropMarket::HomeRun) - 0.9).abs() < 1e-9);
        assert!((table.apply(PropMarket::HomeRun, 0.2) - 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_pending_until_min_samples() {
        let mut table = CalibrationTable::new();
        assert!(table.update(&day(PropMarket::StolenBase, 0.2, 1, 4), 0.2, 10).is_empty());
        assert_eq!(table.multiplier(PropMarket::StolenBase), 1.0);
        assert_eq!(table.markets["stolen_base"].pending_count, 5);

        let moved = table.update(&day(PropMarket::StolenBase, 0.2, 3, 2), 0.2, 10);
        assert_eq!(moved, vec![PropMarket::StolenBase]);
        let cal = &table.markets["stolen_base"];
        assert_eq!(cal.samples, 10);
        assert_eq!(cal.pending_count, 0);
        // 4 / 10 observed vs 0.2 predicted: target 2.0, new 1.2
        assert!((cal.multiplier - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_is_clamped_and_voids_ignored() {
        let mut table = CalibrationTable::new();
        let mut picks = day(PropMarket::TwoPlusHits, 0.05, 10, 0);
        picks.push(graded(PropMarket::TwoPlusHits, 0.05, Outcome::Void));
        table.update(&picks, 1.0, 10);
        assert_eq!(table.multiplier(PropMarket::TwoPlusHits), MULTIPLIER_MAX);
        assert_eq!(table.markets["two_plus_hits"].samples, 10);
    }

    #[test]
    fn test_day_absorbed_once() {
        let mut table = CalibrationTable::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let picks = day(PropMarket::HomeRun, 0.2, 2, 18);
        assert_eq!(table.absorb_day(date, &picks, 0.2, 10), Some(vec![PropMarket::HomeRun]));
        assert_eq!(table.absorb_day(date, &picks, 0.2, 10), None);
        assert_eq!(table.markets["home_run"].samples, 20);
        assert!((table.multiplier(PropMarket::HomeRun) - 0.9).abs() < 1e-9);

        let json = serde_json::to_string(&table).unwrap();
        let mut restored: CalibrationTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.absorb_day(date, &picks, 0.2, 10), None);
        // Tables written before days were tracked still load
        let legacy: CalibrationTable = serde_json::from_str(r#"{"markets":{}}"#).unwrap();
        assert!(legacy.absorbed_days.is_empty());
    }

    #[test]
    fn test_brier_tracked() {
        let mut table = CalibrationTable::new();
        table.update(&day(PropMarket::HomeRun, 0.5, 5, 5), 0.2, 10);
        let cal = &table.markets["home_run"];
        assert!((cal.brier.unwrap() - 0.25).abs() < 1e-9);
        assert!((cal.log_loss.unwrap() - 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_report_buckets() {
        let mut picks = day(PropMarket::HomeRun, 0.15, 1, 3);
        picks.extend(day(PropMarket::HomeRun, 0.35, 2, 2));
        picks.push(graded(PropMarket::HomeRun, 0.35, Outcome::Void));
        let report = calibration_report(&picks);
        assert_eq!(report.len(), 1);
        let hr = &report[0];
        assert_eq!(hr.count, 8);
        assert_eq!(hr.hits, 3);
        assert_eq!(hr.buckets.len(), 2);
        assert_eq!(hr.buckets[0].bin_start, 0.1);
        assert!((hr.buckets[1].actual_rate - 0.5).abs() < 1e-9);
    }
}

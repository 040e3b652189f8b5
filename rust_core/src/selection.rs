//! Turns scored props into ranked picks.
//!
//! Each candidate is priced against its market quote (when one exists),
//! blended, calibrated, filtered, scored and ranked within its market.

use crate::calibration::CalibrationTable;
use crate::models::{MarketQuote, Pick, PropMarket, Tier};
use crate::probability::blend::blend_probabilities;
use crate::probability::ScoredProp;
use crate::utils::odds::{american_to_implied, edge, expected_value, format_american, no_vig_two_way};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Picks kept per market
    pub top_n: usize,
    /// Picks per game per market
    pub max_per_game: usize,
    /// Share of the blend given to the market price
    pub market_weight: f64,
    /// Minimum edge over the market when a price exists
    pub min_edge: f64,
    /// How strongly positive edge lifts the ranking score
    pub edge_weight: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            top_n: 10,
            max_per_game: 2,
            market_weight: 0.5,
            min_edge: 0.0,
            edge_weight: 2.0,
        }
    }
}

/// Minimum calibrated probability for a market to make the board
pub fn min_probability(market: PropMarket) -> f64 {
    match market {
        PropMarket::HomeRun => 0.12,
        PropMarket::StolenBase => 0.15,
        PropMarket::TwoPlusHits => 0.20,
        PropMarket::AnytimeGoal => 0.25,
    }
}

pub fn tier_for(market: PropMarket, calibrated: f64) -> Tier {
    let min = min_probability(market);
    if calibrated >= 2.0 * min {
        Tier::Strong
    } else if calibrated >= 1.5 * min {
        Tier::Solid
    } else {
        Tier::Longshot
    }
}

/// A scored prop and the best quote found for it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub scored: ScoredProp,
    pub quote: Option<MarketQuote>,
}

/// Market probability for a quote: no-vig when both sides exist
fn market_probability(quote: &MarketQuote) -> Option<(f64, bool)> {
    match quote.opposing_american {
        Some(opp) => no_vig_two_way(quote.american, opp).map(|p| (p, true)),
        None => american_to_implied(quote.american).map(|p| (p, false)),
    }
}

/// Price one candidate. Does not apply filters.
pub fn price_candidate(cand: Candidate, calibration: &CalibrationTable, params: &SelectionParams) -> Pick {
    let Candidate { scored, quote } = cand;
    let ctx = scored.ctx;
    let market = ctx.market;

    let mut reasons = vec![format!("model {:.1}%", scored.model_prob * 100.0)];

    let priced = quote.as_ref().and_then(|q| market_probability(q).map(|m| (q, m)));
    let market_prob = priced.map(|(_, (p, _))| p);
    if let Some((q, (p, fair))) = priced {
        reasons.push(format!(
            "market {:.1}% at {} {}{}",
            p * 100.0,
            format_american(q.american),
            q.book,
            if fair { " (no-vig)" } else { "" }
        ));
    }

    let blended = blend_probabilities(scored.model_prob, market_prob, params.market_weight);
    let multiplier = calibration.multiplier(market);
    let calibrated = calibration.apply(market, blended);
    if (multiplier - 1.0).abs() > 1e-9 {
        reasons.push(format!("calibration x{:.2}", multiplier));
    }

    let pick_edge = market_prob.map(|m| edge(calibrated, m));
    let ev = quote.as_ref().and_then(|q| expected_value(calibrated, q.american));
    let score = calibrated * (1.0 + params.edge_weight * pick_edge.unwrap_or(0.0).max(0.0));

    Pick {
        game_id: ctx.game_id.clone(),
        matchup: ctx.matchup.clone(),
        market,
        player_id: ctx.subject.player_id(),
        player_name: ctx.subject.player_name().to_string(),
        team_abbr: ctx.subject.team_abbr().to_string(),
        model_prob: scored.model_prob,
        market_prob,
        blended_prob: blended,
        calibrated_prob: calibrated,
        american_odds: quote.as_ref().map(|q| q.american),
        book: quote.map(|q| q.book),
        edge: pick_edge,
        expected_value: ev,
        score,
        tier: tier_for(market, calibrated),
        reasons,
    }
}

fn rank_order(a: &Pick, b: &Pick) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.calibrated_prob.total_cmp(&a.calibrated_prob))
        .then_with(|| a.player_name.cmp(&b.player_name))
}

/// Price, filter and rank candidates into the day's picks.
///
/// Output is grouped by market in `PropMarket` order, best first.
pub fn select_picks(
    candidates: Vec<Candidate>,
    calibration: &CalibrationTable,
    params: &SelectionParams,
) -> Vec<Pick> {
    let mut by_market: HashMap<PropMarket, Vec<Pick>> = HashMap::new();
    for cand in candidates {
        let pick = price_candidate(cand, calibration, params);
        if pick.calibrated_prob < min_probability(pick.market) {
            continue;
        }
        if matches!(pick.edge, Some(e) if e < params.min_edge) {
            continue;
        }
        by_market.entry(pick.market).or_default().push(pick);
    }

    let mut out = Vec::new();
    for market in PropMarket::ALL {
        let Some(mut picks) = by_market.remove(&market) else {
            continue;
        };
        picks.sort_by(rank_order);

        let mut per_game: HashMap<String, usize> = HashMap::new();
        let mut seen_players: Vec<String> = Vec::new();
        for pick in picks {
            if out.iter().filter(|p: &&Pick| p.market == market).count() >= params.top_n {
                break;
            }
            if seen_players.contains(&pick.player_id) {
                continue;
            }
            let count = per_game.entry(pick.game_id.clone()).or_insert(0);
            if *count >= params.max_per_game {
                continue;
            }
            *count += 1;
            seen_players.push(pick.player_id.clone());
            out.push(pick);
        }
    }
    out
}

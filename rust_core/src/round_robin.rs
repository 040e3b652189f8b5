//! Naive round-robin unit allocation.
//!
//! Splits a unit budget evenly over every `size`-leg parlay that can be
//! built from the picks. Legs are treated as independent.

use crate::models::{Pick, RoundRobinPlan, RoundRobinTicket};
use crate::utils::odds::american_to_decimal;
use crate::utils::units::Units;
use anyhow::{anyhow, Result};

/// Largest pick pool we will expand (C(12, 6) = 924 tickets)
pub const MAX_LEGS: usize = 12;

/// All k-combinations of 0..n in lexicographic order
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        // Rightmost index that can still move
        let Some(i) = (0..k).rev().find(|&i| idx[i] != i + n - k) else {
            return out;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// Decimal payout for a leg; picks without a quote are priced at fair odds
fn leg_decimal(pick: &Pick) -> f64 {
    pick.american_odds
        .and_then(american_to_decimal)
        .unwrap_or_else(|| 1.0 / pick.calibrated_prob.max(1e-6))
}

/// Positions in `picks` of the `max` best picks by score
pub fn round_robin_pool(picks: &[Pick], max: usize) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..picks.len()).collect();
    pool.sort_by(|&a, &b| {
        picks[b]
            .score
            .total_cmp(&picks[a].score)
            .then_with(|| picks[a].player_name.cmp(&picks[b].player_name))
    });
    pool.truncate(max);
    pool
}

/// Round robin over the `pool_size` best picks.
///
/// Ticket legs index into `picks` itself, so a saved day resolves them
/// without rebuilding the pool.
pub fn plan_best_round_robin(
    picks: &[Pick],
    pool_size: usize,
    size: usize,
    total_units: f64,
) -> Result<RoundRobinPlan> {
    let pool = round_robin_pool(picks, pool_size);
    let pool_picks: Vec<Pick> = pool.iter().map(|&i| picks[i].clone()).collect();
    let mut plan = plan_round_robin(&pool_picks, size, total_units)?;
    for ticket in &mut plan.tickets {
        for leg in &mut ticket.legs {
            *leg = pool[*leg];
        }
    }
    Ok(plan)
}

pub fn plan_round_robin(picks: &[Pick], size: usize, total_units: f64) -> Result<RoundRobinPlan> {
    let n = picks.len();
    if size == 0 {
        return Err(anyhow!("Round robin size must be at least 1"));
    }
    if size > n {
        return Err(anyhow!("Round robin by {} needs at least {} picks, have {}", size, size, n));
    }
    if n > MAX_LEGS {
        return Err(anyhow!("Round robin supports at most {} picks, have {}", MAX_LEGS, n));
    }

    let combos = combinations(n, size);
    let per_ticket = Units::from_units(total_units).split_floor(combos.len(), Units::STAKE_STEP);
    if per_ticket.is_zero() {
        return Err(anyhow!(
            "{:.2} units over {} tickets rounds to zero per ticket",
            total_units,
            combos.len()
        ));
    }

    let tickets: Vec<RoundRobinTicket> = combos
        .into_iter()
        .map(|legs| {
            let decimal_payout: f64 = legs.iter().map(|&i| leg_decimal(&picks[i])).product();
            let hit_prob: f64 = legs.iter().map(|&i| picks[i].calibrated_prob).product();
            let expected_value = per_ticket.as_units() * (hit_prob * decimal_payout - 1.0);
            RoundRobinTicket {
                legs,
                units: per_ticket.as_units(),
                decimal_payout,
                hit_prob,
                expected_value,
            }
        })
        .collect();

    let staked = per_ticket * tickets.len() as i64;
    let max_payout: Units = tickets.iter().map(|t| per_ticket.scale(t.decimal_payout)).sum();
    let expected_return: f64 = tickets
        .iter()
        .map(|t| per_ticket.as_units() * t.hit_prob * t.decimal_payout)
        .sum();

    Ok(RoundRobinPlan {
        size,
        total_units,
        units_per_ticket: per_ticket.as_units(),
        staked_units: staked.as_units(),
        max_payout_units: max_payout.as_units(),
        expected_return_units: expected_return,
        tickets,
    })
}

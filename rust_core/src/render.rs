//! Plain-text and JSON rendering of a day's picks.

use crate::models::{DailyPicks, Pick, PropMarket, RoundRobinPlan};
use crate::utils::odds::format_american;
use anyhow::Result;
use std::fmt::Write;

const NAME_WIDTH: usize = 24;
const MATCHUP_WIDTH: usize = 13;

fn pct(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn pick_row(rank: usize, p: &Pick) -> String {
    format!(
        "{:>3}  {:<nw$} {:<4} {:<mw$} {:>6} {:>7} {:>6} {:>6}  {}",
        rank,
        truncate(&p.player_name, NAME_WIDTH),
        p.team_abbr,
        truncate(&p.matchup, MATCHUP_WIDTH),
        pct(p.calibrated_prob),
        p.market_prob.map(pct).unwrap_or_else(|| "-".to_string()),
        p.edge
            .map(|e| format!("{:+.1}", e * 100.0))
            .unwrap_or_else(|| "-".to_string()),
        p.american_odds
            .map(format_american)
            .unwrap_or_else(|| "-".to_string()),
        p.tier.as_str(),
        nw = NAME_WIDTH,
        mw = MATCHUP_WIDTH,
    )
}

fn header() -> String {
    format!(
        "{:>3}  {:<nw$} {:<4} {:<mw$} {:>6} {:>7} {:>6} {:>6}  {}",
        "#",
        "Player",
        "Team",
        "Matchup",
        "Prob",
        "Market",
        "Edge",
        "Odds",
        "Tier",
        nw = NAME_WIDTH,
        mw = MATCHUP_WIDTH,
    )
}

fn render_round_robin(out: &mut String, plan: &RoundRobinPlan, picks: &[Pick]) {
    let _ = writeln!(
        out,
        "Round robin by {}: {} tickets x {:.2}u = {:.2}u staked",
        plan.size,
        plan.tickets.len(),
        plan.units_per_ticket,
        plan.staked_units
    );
    let _ = writeln!(
        out,
        "  max payout {:.2}u, expected return {:.2}u",
        plan.max_payout_units, plan.expected_return_units
    );
    for ticket in &plan.tickets {
        let legs: Vec<String> = ticket
            .legs
            .iter()
            .map(|&i| {
                picks
                    .get(i)
                    .map(|p| format!("{} {}", p.player_name, p.market.label()))
                    .unwrap_or_else(|| format!("leg {}", i))
            })
            .collect();
        let _ = writeln!(
            out,
            "  {} | {:.2}x | hit {} | EV {:+.2}u",
            legs.join(" + "),
            ticket.decimal_payout,
            pct(ticket.hit_prob),
            ticket.expected_value
        );
    }
}

/// Ranked table per market followed by the round robin.
///
/// Round-robin legs index into the picks sorted by score, the order the
/// plan was built from.
pub fn render_text(daily: &DailyPicks) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} picks for {} ({} games, generated {})",
        daily.sport.as_str().to_uppercase(),
        daily.date,
        daily.games,
        daily.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    if daily.picks.is_empty() {
        let _ = writeln!(out, "\nNo picks.");
    }

    for market in PropMarket::ALL {
        let picks: Vec<&Pick> = daily.picks_for(market).collect();
        if picks.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", market.label());
        let _ = writeln!(out, "{}", header());
        for (i, p) in picks.iter().enumerate() {
            let _ = writeln!(out, "{}", pick_row(i + 1, p));
        }
    }

    if let Some(plan) = &daily.round_robin {
        out.push('\n');
        render_round_robin(&mut out, plan, &daily.picks);
    }
    out
}

pub fn render_json(daily: &DailyPicks) -> Result<String> {
    Ok(serde_json::to_string_pretty(daily)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoundRobinTicket, Sport, Tier};
    use chrono::{NaiveDate, Utc};

    fn pick(name: &str, market: PropMarket, prob: f64, odds: Option<i32>) -> Pick {
        Pick {
            game_id: "g1".to_string(),
            matchup: "LAD @ COL".to_string(),
            market,
            player_id: name.to_string(),
            player_name: name.to_string(),
            team_abbr: "LAD".to_string(),
            model_prob: prob,
            market_prob: odds.map(|_| 0.2),
            blended_prob: prob,
            calibrated_prob: prob,
            american_odds: odds,
            book: None,
            edge: odds.map(|_| prob - 0.2),
            expected_value: None,
            score: prob,
            tier: Tier::Strong,
            reasons: Vec::new(),
        }
    }

    fn daily(picks: Vec<Pick>, round_robin: Option<RoundRobinPlan>) -> DailyPicks {
        DailyPicks {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            sport: Sport::Mlb,
            generated_at: Utc::now(),
            run_id: uuid::Uuid::new_v4(),
            games: 15,
            picks,
            round_robin,
        }
    }

    #[test]
    fn test_text_groups_by_market() {
        let d = daily(
            vec![
                pick("Shohei Ohtani", PropMarket::HomeRun, 0.25, Some(300)),
                pick("Mookie Betts", PropMarket::TwoPlusHits, 0.31, None),
            ],
            None,
        );
        let text = render_text(&d);
        assert!(text.starts_with("MLB picks for 2024-06-01 (15 games"));
        let hr = text.find("Home Run").unwrap();
        let hits = text.find("2+ Hits").unwrap();
        assert!(hr < hits);
        assert!(text.contains("Shohei Ohtani"));
        assert!(text.contains("+300"));
        assert!(text.contains("25.0%"));
        assert!(text.contains("+5.0"));
        assert!(!text.contains("Stolen Base"));
    }

    #[test]
    fn test_text_round_robin_block() {
        let plan = RoundRobinPlan {
            size: 2,
            total_units: 1.0,
            units_per_ticket: 1.0,
            tickets: vec![RoundRobinTicket {
                legs: vec![1, 0],
                units: 1.0,
                decimal_payout: 12.0,
                hit_prob: 0.0775,
                expected_value: -0.07,
            }],
            staked_units: 1.0,
            max_payout_units: 12.0,
            expected_return_units: 0.93,
        };
        let d = daily(
            vec![
                pick("Low", PropMarket::HomeRun, 0.25, Some(300)),
                pick("High", PropMarket::StolenBase, 0.31, Some(200)),
            ],
            Some(plan),
        );
        let text = render_text(&d);
        assert!(text.contains("Round robin by 2: 1 tickets"));
        // Legs are positions in the saved pick list
        assert!(text.contains("High Stolen Base + Low Home Run"));
    }

    #[test]
    fn test_empty_day() {
        let text = render_text(&daily(Vec::new(), None));
        assert!(text.contains("No picks."));
    }

    #[test]
    fn test_json_round_trips() {
        let d = daily(vec![pick("A", PropMarket::HomeRun, 0.2, None)], None);
        let json = render_json(&d).unwrap();
        let back: DailyPicks = serde_json::from_str(&json).unwrap();
        assert_eq!(back.picks.len(), 1);
        assert_eq!(back.run_id, d.run_id);
    }

    #[test]
    fn test_long_names_truncated() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdefgh", 5).chars().count(), 5);
    }
}

// Shared models for the picks engine
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Sport & Market Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Mlb,
    Nfl,
    Soccer,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Mlb => "mlb",
            Sport::Nfl => "nfl",
            Sport::Soccer => "soccer",
        }
    }

    /// Prop markets with a scoring model for this sport
    pub fn prop_markets(&self) -> &'static [PropMarket] {
        match self {
            Sport::Mlb => &[
                PropMarket::HomeRun,
                PropMarket::StolenBase,
                PropMarket::TwoPlusHits,
            ],
            Sport::Soccer => &[PropMarket::AnytimeGoal],
            Sport::Nfl => &[],
        }
    }
}

impl std::str::FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mlb" | "baseball" => Ok(Sport::Mlb),
            "nfl" | "football" => Ok(Sport::Nfl),
            "soccer" | "epl" | "mls" => Ok(Sport::Soccer),
            other => Err(anyhow::anyhow!(
                "Unknown sport: {} (expected mlb|nfl|soccer)",
                other
            )),
        }
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropMarket {
    HomeRun,
    StolenBase,
    TwoPlusHits,
    AnytimeGoal,
}

impl PropMarket {
    pub const ALL: [PropMarket; 4] = [
        PropMarket::HomeRun,
        PropMarket::StolenBase,
        PropMarket::TwoPlusHits,
        PropMarket::AnytimeGoal,
    ];

    /// Stable key used in persisted blobs and the calibration table
    pub fn key(&self) -> &'static str {
        match self {
            PropMarket::HomeRun => "home_run",
            PropMarket::StolenBase => "stolen_base",
            PropMarket::TwoPlusHits => "two_plus_hits",
            PropMarket::AnytimeGoal => "anytime_goal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PropMarket::HomeRun => "Home Run",
            PropMarket::StolenBase => "Stolen Base",
            PropMarket::TwoPlusHits => "2+ Hits",
            PropMarket::AnytimeGoal => "Anytime Goal",
        }
    }

    /// Stat value needed for the prop to cash
    pub fn threshold(&self) -> u32 {
        match self {
            PropMarket::TwoPlusHits => 2,
            _ => 1,
        }
    }

    pub fn sport(&self) -> Sport {
        match self {
            PropMarket::AnytimeGoal => Sport::Soccer,
            _ => Sport::Mlb,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    L,
    R,
    S,
}

impl Hand {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "L" => Some(Hand::L),
            "R" => Some(Hand::R),
            "S" => Some(Hand::S),
            _ => None,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
    pub abbr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbablePitcher {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub sport: Sport,
    pub start_time: Option<DateTime<Utc>>,
    pub home: TeamRef,
    pub away: TeamRef,
    pub venue: Option<String>,
    pub status: String,
    #[serde(default)]
    pub home_probable: Option<ProbablePitcher>,
    #[serde(default)]
    pub away_probable: Option<ProbablePitcher>,
}

impl Game {
    pub fn matchup(&self) -> String {
        let away = if self.away.abbr.is_empty() { &self.away.name } else { &self.away.abbr };
        let home = if self.home.abbr.is_empty() { &self.home.name } else { &self.home.abbr };
        format!("{} @ {}", away, home)
    }

    pub fn is_final(&self) -> bool {
        let s = self.status.to_lowercase();
        s.contains("final") || s.contains("game over") || s.contains("completed")
    }

    /// Postponed, cancelled or suspended: the game will not finish today
    pub fn is_called_off(&self) -> bool {
        status_called_off(&self.status)
    }
}

/// Status text (MLB `detailedState`, ESPN type name or description) of a
/// game that will not be completed on its scheduled date
pub fn status_called_off(status: &str) -> bool {
    let s = status.to_lowercase();
    ["postponed", "cancel", "suspended", "abandoned"]
        .iter()
        .any(|k| s.contains(k))
}

// ============================================================================
// Player profiles
// ============================================================================

/// Season hitting line plus lineup context for one batter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatterProfile {
    pub player_id: u64,
    pub name: String,
    pub team_abbr: String,
    pub bats: Option<Hand>,
    pub lineup_slot: Option<u8>,
    pub games: u32,
    pub plate_appearances: u32,
    pub at_bats: u32,
    pub hits: u32,
    pub home_runs: u32,
    pub stolen_bases: u32,
    pub caught_stealing: u32,
    pub walks: u32,
    pub hit_by_pitch: u32,
}

impl BatterProfile {
    /// Times reaching first via hit, walk or HBP, less home runs
    pub fn times_on_first(&self) -> u32 {
        (self.hits + self.walks + self.hit_by_pitch).saturating_sub(self.home_runs)
    }

    pub fn on_base_rate(&self) -> f64 {
        if self.plate_appearances == 0 {
            return 0.0;
        }
        (self.hits + self.walks + self.hit_by_pitch) as f64 / self.plate_appearances as f64
    }

    pub fn steal_attempts(&self) -> u32 {
        self.stolen_bases + self.caught_stealing
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitcherProfile {
    pub player_id: u64,
    pub name: String,
    pub throws: Option<Hand>,
    pub innings_pitched: f64,
    pub batters_faced: u32,
    pub home_runs_allowed: u32,
    pub hits_allowed: u32,
    pub at_bats_against: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorerProfile {
    pub player_id: String,
    pub name: String,
    pub team_abbr: String,
    pub goals: u32,
    pub minutes: u32,
    pub appearances: u32,
    pub penalty_taker: bool,
    /// Expected minutes in this match (defaults to minutes per appearance)
    pub expected_minutes: Option<f64>,
}

// ============================================================================
// Market quotes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketQuote {
    pub book: String,
    pub american: i32,
    /// Opposite side (Under / No) when the book quotes it
    #[serde(default)]
    pub opposing_american: Option<i32>,
}

// ============================================================================
// Picks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Longshot,
    Solid,
    Strong,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Longshot => "longshot",
            Tier::Solid => "solid",
            Tier::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub game_id: String,
    pub matchup: String,
    pub market: PropMarket,
    pub player_id: String,
    pub player_name: String,
    pub team_abbr: String,
    pub model_prob: f64,
    /// Market implied probability, no-vig when both sides are quoted
    pub market_prob: Option<f64>,
    pub blended_prob: f64,
    pub calibrated_prob: f64,
    pub american_odds: Option<i32>,
    pub book: Option<String>,
    pub edge: Option<f64>,
    pub expected_value: Option<f64>,
    pub score: f64,
    pub tier: Tier,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRobinTicket {
    /// Positions in `DailyPicks::picks`
    pub legs: Vec<usize>,
    pub units: f64,
    pub decimal_payout: f64,
    pub hit_prob: f64,
    pub expected_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRobinPlan {
    pub size: usize,
    pub total_units: f64,
    pub units_per_ticket: f64,
    pub tickets: Vec<RoundRobinTicket>,
    pub staked_units: f64,
    pub max_payout_units: f64,
    pub expected_return_units: f64,
}

/// Persisted daily picks blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPicks {
    pub date: NaiveDate,
    pub sport: Sport,
    pub generated_at: DateTime<Utc>,
    pub run_id: uuid::Uuid,
    pub games: usize,
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub round_robin: Option<RoundRobinPlan>,
}

impl DailyPicks {
    pub fn picks_for(&self, market: PropMarket) -> impl Iterator<Item = &Pick> {
        self.picks.iter().filter(move |p| p.market == market)
    }
}

// ============================================================================
// Grading
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Hit,
    Miss,
    Void,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedPick {
    pub pick: Pick,
    pub outcome: Outcome,
    pub actual: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedDay {
    pub date: NaiveDate,
    pub graded_at: DateTime<Utc>,
    pub run_id: uuid::Uuid,
    pub picks: Vec<GradedPick>,
    /// Set once calibration has absorbed this day
    #[serde(default)]
    pub calibrated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_keys_round_trip() {
        for market in PropMarket::ALL {
            assert_eq!(PropMarket::from_key(market.key()), Some(market));
        }
        assert_eq!(PropMarket::from_key("touchdown"), None);
    }

    #[test]
    fn test_sport_parsing() {
        assert_eq!("MLB".parse::<Sport>().unwrap(), Sport::Mlb);
        assert_eq!("epl".parse::<Sport>().unwrap(), Sport::Soccer);
        assert!("cricket".parse::<Sport>().is_err());
    }

    #[test]
    fn test_nfl_has_no_prop_markets() {
        assert!(Sport::Nfl.prop_markets().is_empty());
        assert_eq!(Sport::Mlb.prop_markets().len(), 3);
    }

    #[test]
    fn test_times_on_first_excludes_home_runs() {
        let batter = BatterProfile {
            hits: 100,
            walks: 40,
            hit_by_pitch: 5,
            home_runs: 25,
            plate_appearances: 500,
            ..Default::default()
        };
        assert_eq!(batter.times_on_first(), 120);
        assert!((batter.on_base_rate() - 0.29).abs() < 1e-9);
    }

    #[test]
    fn test_game_final_status() {
        let mut game = Game {
            id: "1".to_string(),
            sport: Sport::Mlb,
            start_time: None,
            home: TeamRef { id: "1".into(), name: "Home".into(), abbr: "HOM".into() },
            away: TeamRef { id: "2".into(), name: "Away".into(), abbr: String::new() },
            venue: None,
            status: "Final".to_string(),
            home_probable: None,
            away_probable: None,
        };
        assert!(game.is_final());
        assert_eq!(game.matchup(), "Away @ HOM");
        game.status = "Scheduled".to_string();
        assert!(!game.is_final());
        assert!(!game.is_called_off());
    }

    #[test]
    fn test_game_called_off_status() {
        for status in ["Postponed", "Cancelled", "Suspended: Rain", "STATUS_CANCELED", "STATUS_ABANDONED"] {
            assert!(status_called_off(status), "{}", status);
        }
        for status in ["Final", "In Progress", "Delayed Start: Rain", "STATUS_SCHEDULED"] {
            assert!(!status_called_off(status), "{}", status);
        }
    }
}

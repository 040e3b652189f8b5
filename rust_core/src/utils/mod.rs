pub mod matching;
pub mod odds;
pub mod units;

pub use matching::{normalize_player_name, MatchConfidence, PlayerIndex};
pub use units::Units;

//! League configuration for supported sports.
//!
//! Maps each league to its ESPN scoreboard path and Odds API sport key.

use crate::models::Sport;

/// Configuration for a single league.
#[derive(Debug, Clone)]
pub struct LeagueConfig {
    /// League code (e.g., "mlb", "epl")
    pub league_code: &'static str,
    pub sport: Sport,
    /// ESPN sport path segment ("baseball", "football", "soccer")
    pub espn_sport: &'static str,
    /// ESPN league path segment ("mlb", "nfl", "eng.1")
    pub espn_league: &'static str,
    /// The Odds API sport key
    pub odds_sport_key: &'static str,
}

/// Static configuration for all supported leagues.
pub static LEAGUE_CONFIGS: &[LeagueConfig] = &[
    LeagueConfig {
        league_code: "mlb",
        sport: Sport::Mlb,
        espn_sport: "baseball",
        espn_league: "mlb",
        odds_sport_key: "baseball_mlb",
    },
    LeagueConfig {
        league_code: "nfl",
        sport: Sport::Nfl,
        espn_sport: "football",
        espn_league: "nfl",
        odds_sport_key: "americanfootball_nfl",
    },
    // Soccer
    LeagueConfig {
        league_code: "epl",
        sport: Sport::Soccer,
        espn_sport: "soccer",
        espn_league: "eng.1",
        odds_sport_key: "soccer_epl",
    },
    LeagueConfig {
        league_code: "laliga",
        sport: Sport::Soccer,
        espn_sport: "soccer",
        espn_league: "esp.1",
        odds_sport_key: "soccer_spain_la_liga",
    },
    LeagueConfig {
        league_code: "bundesliga",
        sport: Sport::Soccer,
        espn_sport: "soccer",
        espn_league: "ger.1",
        odds_sport_key: "soccer_germany_bundesliga",
    },
    LeagueConfig {
        league_code: "seriea",
        sport: Sport::Soccer,
        espn_sport: "soccer",
        espn_league: "ita.1",
        odds_sport_key: "soccer_italy_serie_a",
    },
    LeagueConfig {
        league_code: "ligue1",
        sport: Sport::Soccer,
        espn_sport: "soccer",
        espn_league: "fra.1",
        odds_sport_key: "soccer_france_ligue_one",
    },
    LeagueConfig {
        league_code: "mls",
        sport: Sport::Soccer,
        espn_sport: "soccer",
        espn_league: "usa.1",
        odds_sport_key: "soccer_usa_mls",
    },
];

/// Get league configuration by code.
pub fn get_league_config(league: &str) -> Option<&'static LeagueConfig> {
    LEAGUE_CONFIGS
        .iter()
        .find(|c| c.league_code.eq_ignore_ascii_case(league))
}

/// League used when only a sport is given
pub fn default_league(sport: Sport) -> &'static LeagueConfig {
    let code = match sport {
        Sport::Mlb => "mlb",
        Sport::Nfl => "nfl",
        Sport::Soccer => "epl",
    };
    LEAGUE_CONFIGS
        .iter()
        .find(|c| c.league_code == code)
        .unwrap_or(&LEAGUE_CONFIGS[0])
}

/// Find the league an ESPN league path belongs to
pub fn league_for_espn(espn_league: &str) -> Option<&'static LeagueConfig> {
    LEAGUE_CONFIGS.iter().find(|c| c.espn_league == espn_league)
}

pub fn leagues_for(sport: Sport) -> impl Iterator<Item = &'static LeagueConfig> {
    LEAGUE_CONFIGS.iter().filter(move |c| c.sport == sport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_league_config() {
        let epl = get_league_config("epl").unwrap();
        assert_eq!(epl.espn_league, "eng.1");
        assert_eq!(epl.odds_sport_key, "soccer_epl");
    }

    #[test]
    fn test_case_insensitivity() {
        assert!(get_league_config("MLB").is_some());
        assert!(get_league_config("Mls").is_some());
        assert!(get_league_config("nonexistent").is_none());
    }

    #[test]
    fn test_default_league_per_sport() {
        for sport in [Sport::Mlb, Sport::Nfl, Sport::Soccer] {
            assert_eq!(default_league(sport).sport, sport);
        }
        assert_eq!(default_league(Sport::Mlb).odds_sport_key, "baseball_mlb");
    }

    #[test]
    fn test_soccer_leagues() {
        assert_eq!(leagues_for(Sport::Soccer).count(), 6);
        assert_eq!(league_for_espn("usa.1").unwrap().league_code, "mls");
    }
}

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use picks_rust_core::clients::{espn, mlb_stats, odds_api};

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,

    pub odds_api_key: Option<String>,
    pub odds_api_base_url: String,
    pub mlb_stats_base_url: String,
    pub espn_base_url: String,
    pub http_timeout: Duration,
    pub fetch_concurrency: usize,

    pub bind_addr: String,
    pub timezone: Tz,
    pub save_picks_at: NaiveTime,
    pub backfill_at: NaiveTime,

    pub top_n: usize,
    pub round_robin_units: f64,
    pub round_robin_size: usize,
    pub market_weight: f64,
    pub calibration_alpha: f64,
    pub calibration_min_samples: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(env::var("PICKS_DATA_DIR").unwrap_or_else(|_| "./data".to_string()));

        let odds_api_key = env::var("ODDS_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let odds_api_base_url =
            env::var("ODDS_API_BASE_URL").unwrap_or_else(|_| odds_api::DEFAULT_BASE_URL.to_string());
        let mlb_stats_base_url =
            env::var("MLB_STATS_BASE_URL").unwrap_or_else(|_| mlb_stats::DEFAULT_BASE_URL.to_string());
        let espn_base_url =
            env::var("ESPN_BASE_URL").unwrap_or_else(|_| espn::DEFAULT_BASE_URL.to_string());

        let http_timeout =
            Duration::from_secs(parse_u64_env("HTTP_TIMEOUT_SECS", 10).context("HTTP_TIMEOUT_SECS")?);
        let fetch_concurrency =
            parse_usize_env("FETCH_CONCURRENCY", 8).context("FETCH_CONCURRENCY")?;

        let bind_addr = env::var("PICKS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let timezone_str =
            env::var("PICKS_TIMEZONE").unwrap_or_else(|_| "America/New_York".to_string());
        let timezone = Tz::from_str(&timezone_str).map_err(|_| {
            anyhow!(
                "Invalid PICKS_TIMEZONE: {} (expected IANA tz like America/New_York)",
                timezone_str
            )
        })?;
        let save_picks_at = parse_time_env("SAVE_PICKS_AT", "11:00").context("SAVE_PICKS_AT")?;
        let backfill_at = parse_time_env("BACKFILL_AT", "05:00").context("BACKFILL_AT")?;
        check_schedule(save_picks_at, backfill_at)?;

        let top_n = parse_usize_env("PICKS_TOP_N", 10).context("PICKS_TOP_N")?;
        let round_robin_units =
            parse_f64_env("ROUND_ROBIN_UNITS", 10.0).context("ROUND_ROBIN_UNITS")?;
        let round_robin_size = parse_usize_env("ROUND_ROBIN_SIZE", 2).context("ROUND_ROBIN_SIZE")?;
        let market_weight = parse_f64_env("MARKET_WEIGHT", 0.5).context("MARKET_WEIGHT")?;
        if !(0.0..=1.0).contains(&market_weight) {
            return Err(anyhow!("MARKET_WEIGHT must be within [0, 1], got {}", market_weight));
        }
        let calibration_alpha =
            parse_f64_env("CALIBRATION_ALPHA", 0.2).context("CALIBRATION_ALPHA")?;
        if !(0.0..=1.0).contains(&calibration_alpha) {
            return Err(anyhow!("CALIBRATION_ALPHA must be within [0, 1], got {}", calibration_alpha));
        }
        let calibration_min_samples = parse_usize_env("CALIBRATION_MIN_SAMPLES", 10)
            .context("CALIBRATION_MIN_SAMPLES")? as u32;

        Ok(Self {
            data_dir,
            odds_api_key,
            odds_api_base_url,
            mlb_stats_base_url,
            espn_base_url,
            http_timeout,
            fetch_concurrency,
            bind_addr,
            timezone,
            save_picks_at,
            backfill_at,
            top_n,
            round_robin_units,
            round_robin_size,
            market_weight,
            calibration_alpha,
            calibration_min_samples,
        })
    }
}

/// The scheduler runs one job per slot, so the two times must differ
fn check_schedule(save_picks_at: NaiveTime, backfill_at: NaiveTime) -> Result<()> {
    if save_picks_at == backfill_at {
        return Err(anyhow!(
            "SAVE_PICKS_AT and BACKFILL_AT must differ, both are {}",
            save_picks_at.format("%H:%M")
        ));
    }
    Ok(())
}

fn parse_time_env(key: &str, default: &str) -> Result<NaiveTime> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("Invalid {key}: {raw} (expected HH:MM)"))
}

fn parse_usize_env(key: &str, default: usize) -> Result<usize> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<usize>()
        .with_context(|| format!("Invalid {key}: {raw} (expected integer)"))
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected integer)"))
}

fn parse_f64_env(key: &str, default: f64) -> Result<f64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    let value = raw
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected number)"))?;
    if !value.is_finite() {
        return Err(anyhow!("Invalid {key}: {raw} (expected finite number)"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are unique per test so parallel tests do not race on the env
    #[test]
    fn test_parse_helpers_defaults_and_overrides() {
        assert_eq!(parse_usize_env("PICKS_TEST_UNSET_USIZE", 7).unwrap(), 7);

        env::set_var("PICKS_TEST_F64", " 0.35 ");
        assert_eq!(parse_f64_env("PICKS_TEST_F64", 0.5).unwrap(), 0.35);

        env::set_var("PICKS_TEST_BAD_USIZE", "ten");
        assert!(parse_usize_env("PICKS_TEST_BAD_USIZE", 10).is_err());

        env::set_var("PICKS_TEST_NAN", "NaN");
        assert!(parse_f64_env("PICKS_TEST_NAN", 1.0).is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time_env("PICKS_TEST_UNSET_TIME", "11:00").unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap()
        );
        env::set_var("PICKS_TEST_BAD_TIME", "25:99");
        assert!(parse_time_env("PICKS_TEST_BAD_TIME", "05:00").is_err());
    }

    #[test]
    fn test_save_and_backfill_times_must_differ() {
        let eleven = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
        let five = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
        assert!(check_schedule(eleven, five).is_ok());
        let err = check_schedule(eleven, eleven).unwrap_err();
        assert!(err.to_string().contains("must differ"));
        assert!(err.to_string().contains("11:00"));
    }
}

pub mod espn;
pub mod mlb_stats;
pub mod odds_api;
pub mod retry;

// Re-export commonly used types
pub use espn::{EspnClient, MatchScorers, ScorerLine};
pub use mlb_stats::{BoxscoreLine, LineupEntry, MlbStatsClient, Side};
pub use odds_api::{OddsApiClient, OddsEvent, QuoteBook};

use crate::circuit_breaker::{ApiCircuitBreaker, ApiCircuitBreakerConfig};
use crate::error::ClientError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Attempts per upstream GET (first try included)
const GET_ATTEMPTS: u32 = 3;

/// Connection settings shared by every upstream client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub breaker: ApiCircuitBreakerConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            breaker: ApiCircuitBreakerConfig::default(),
        }
    }
}

/// A JSON-over-HTTP upstream guarded by a circuit breaker and retries
#[derive(Clone)]
pub(crate) struct JsonSource {
    name: &'static str,
    base_url: String,
    client: Client,
    breaker: Arc<ApiCircuitBreaker>,
}

impl std::fmt::Debug for JsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSource")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("circuit_breaker_state", &self.breaker.state())
            .finish()
    }
}

impl JsonSource {
    pub(crate) fn new(name: &'static str, base_url: &str, settings: &ClientSettings) -> Self {
        Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(settings.timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            breaker: Arc::new(ApiCircuitBreaker::new(name, settings.breaker.clone())),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn is_available(&self) -> bool {
        self.breaker.is_available()
    }

    /// GET `path` (relative to the base URL) and decode it as JSON
    pub(crate) async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, ClientError> {
        let url = self.url(path);
        let url = url.as_str();
        let this = self;
        retry::with_retry(
            move || this.breaker.call(move || this.fetch(url, query)),
            GET_ATTEMPTS,
        )
        .await
    }

    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value, ClientError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                source_name: self.name.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                source_name: self.name.to_string(),
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ClientError::Decode {
                source_name: self.name.to_string(),
                message: e.to_string(),
            })
    }
}

/// Read a JSON number that some APIs send as a string ("12", "145.2")
pub(crate) fn json_f64(v: &serde_json::Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

pub(crate) fn json_u32(v: &serde_json::Value) -> u32 {
    json_f64(v).map(|f| f.max(0.0) as u32).unwrap_or(0)
}

/// Read an id that may be a number or a string
pub(crate) fn json_id(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_number_helpers() {
        assert_eq!(json_f64(&json!("145.2")), Some(145.2));
        assert_eq!(json_f64(&json!(3)), Some(3.0));
        assert_eq!(json_f64(&json!(null)), None);
        assert_eq!(json_u32(&json!("12")), 12);
        assert_eq!(json_u32(&json!(null)), 0);
        assert_eq!(json_id(&json!(745123)), "745123");
        assert_eq!(json_id(&json!("abc")), "abc");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let src = JsonSource::new("test", "https://example.com/api/", &ClientSettings::default());
        assert_eq!(src.url("/v1/x"), "https://example.com/api/v1/x");
    }
}

//! HTTP surface: daily picks, save, backfill and calibration endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use picks_rust_core::calibration::{calibration_report, CalibrationTable, MarketReport};
use picks_rust_core::grading::{graded_history, ResultsSource};
use picks_rust_core::{
    backfill, BackfillSummary, CalibrationParams, DailyPicks, PicksPipeline, PicksStore, Sport, StoreError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PicksPipeline>,
    pub results: Arc<dyn ResultsSource>,
    pub calibration: CalibrationParams,
    pub timezone: Tz,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/picks", get(get_picks))
        .route("/api/save-picks", post(save_picks))
        .route("/api/backfill", post(run_backfill))
        .route("/api/calibration", get(get_calibration))
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Picks API listening on {}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::NotFound { .. }) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PicksQuery {
    pub date: Option<String>,
    pub sport: Option<String>,
}

impl PicksQuery {
    fn date_or(&self, default: NaiveDate) -> Result<NaiveDate, ApiError> {
        match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => Ok(default),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::BadRequest(format!("Invalid date: {} (expected YYYY-MM-DD)", raw))),
        }
    }

    fn sport(&self) -> Result<Sport, ApiError> {
        match self.sport.as_deref().filter(|s| !s.trim().is_empty()) {
            None => Ok(Sport::Mlb),
            Some(raw) => raw.parse().map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string())),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: i64,
    timezone: String,
    today: NaiveDate,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
        timezone: state.timezone.name().to_string(),
        today: state.today(),
    })
}

/// Saved picks when the day was persisted for this sport, otherwise a live run
async fn get_picks(
    State(state): State<AppState>,
    Query(q): Query<PicksQuery>,
) -> Result<Json<DailyPicks>, ApiError> {
    let date = q.date_or(state.today())?;
    let sport = q.sport()?;

    let stored = state
        .pipeline
        .store()
        .load_daily(date)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    if let Some(daily) = stored.filter(|d| d.sport == sport) {
        return Ok(Json(daily));
    }
    Ok(Json(state.pipeline.generate(date, sport).await?))
}

async fn save_picks(
    State(state): State<AppState>,
    Query(q): Query<PicksQuery>,
) -> Result<Json<DailyPicks>, ApiError> {
    let date = q.date_or(state.today())?;
    let sport = q.sport()?;
    Ok(Json(state.pipeline.save_daily(date, sport).await?))
}

async fn run_backfill(
    State(state): State<AppState>,
    Query(q): Query<PicksQuery>,
) -> Result<Json<BackfillSummary>, ApiError> {
    let date = q.date_or(state.today() - Duration::days(1))?;
    let summary = backfill(
        state.pipeline.store().as_ref(),
        state.results.as_ref(),
        date,
        state.calibration,
    )
    .await?;
    Ok(Json(summary))
}

#[derive(Serialize, Deserialize)]
pub struct CalibrationResponse {
    pub table: CalibrationTable,
    pub report: Vec<MarketReport>,
}

async fn get_calibration(State(state): State<AppState>) -> Result<Json<CalibrationResponse>, ApiError> {
    let store = state.pipeline.store();
    let table = store
        .load_calibration()
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let history = graded_history(store.as_ref()).await?;
    Ok(Json(CalibrationResponse {
        table,
        report: calibration_report(&history),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use picks_rust_core::clients::{ClientSettings, EspnClient, MlbStatsClient};
    use picks_rust_core::grading::GameResult;
    use picks_rust_core::probability::PropModelRegistry;
    use picks_rust_core::{LocalJsonStore, PipelineConfig};
    use std::collections::HashMap;
    use tower::ServiceExt;

    struct NoResults;

    #[async_trait]
    impl ResultsSource for NoResults {
        async fn game_results(
            &self,
            _date: NaiveDate,
            _sport: Sport,
            _game_ids: &[String],
        ) -> anyhow::Result<HashMap<String, GameResult>> {
            Ok(HashMap::new())
        }
    }

    fn state(dir: &std::path::Path) -> AppState {
        // Unroutable upstreams; routes under test never need them
        let settings = ClientSettings {
            timeout: std::time::Duration::from_millis(50),
            ..Default::default()
        };
        let pipeline = PicksPipeline::new(
            MlbStatsClient::with_base_url("http://127.0.0.1:9", &settings),
            EspnClient::with_base_url("http://127.0.0.1:9", &settings),
            None,
            PropModelRegistry::default(),
            Arc::new(LocalJsonStore::new(dir)),
            PipelineConfig::default(),
        );
        AppState {
            pipeline: Arc::new(pipeline),
            results: Arc::new(NoResults),
            calibration: CalibrationParams::default(),
            timezone: chrono_tz::America::New_York,
            started_at: Utc::now(),
        }
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn saved_day(date: NaiveDate) -> DailyPicks {
        DailyPicks {
            date,
            sport: Sport::Mlb,
            generated_at: Utc::now(),
            run_id: uuid::Uuid::new_v4(),
            games: 3,
            picks: Vec::new(),
            round_robin: None,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state(dir.path())), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["timezone"], "America/New_York");
    }

    #[tokio::test]
    async fn test_get_picks_serves_saved_day() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let day = saved_day(date);
        state.pipeline.store().save_daily(&day).await.unwrap();

        let (status, body) = call(router(state), "GET", "/api/picks?date=2024-06-01&sport=mlb").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["games"], 3);
        assert_eq!(body["run_id"], day.run_id.to_string());
    }

    #[tokio::test]
    async fn test_bad_date_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state(dir.path())), "GET", "/api/picks?date=06/01/2024").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid date"));
    }

    #[tokio::test]
    async fn test_unknown_sport_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = call(router(state(dir.path())), "GET", "/api/picks?sport=cricket").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backfill_without_picks_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state(dir.path())), "POST", "/api/backfill?date=2024-06-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("2024-06-01"));
    }

    #[tokio::test]
    async fn test_save_with_upstream_down_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state(dir.path())), "POST", "/api/save-picks?date=2024-06-01").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_calibration_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state(dir.path())), "GET", "/api/calibration").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"], serde_json::json!([]));
    }
}

//! Persistence for daily picks, graded days and the calibration table.
//!
//! Blobs are JSON keyed by date. `LocalJsonStore` lays them out as
//!
//! ```text
//! <dir>/picks/2024-06-01.json
//! <dir>/graded/2024-06-01.json
//! <dir>/calibration.json
//! ```
//!
//! Every write lands in a temp file first and is renamed into place, so a
//! reader never sees a half-written blob.

use crate::calibration::CalibrationTable;
use crate::error::StoreError;
use crate::models::{DailyPicks, GradedDay};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for everything the picks service persists
#[async_trait]
pub trait PicksStore: Send + Sync {
    async fn save_daily(&self, picks: &DailyPicks) -> StoreResult<()>;

    /// Picks saved for `date`, if any
    async fn load_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyPicks>>;

    async fn save_graded(&self, graded: &GradedDay) -> StoreResult<()>;

    async fn load_graded(&self, date: NaiveDate) -> StoreResult<Option<GradedDay>>;

    /// Calibration table, or an empty one when none was saved yet
    async fn load_calibration(&self) -> StoreResult<CalibrationTable>;

    async fn save_calibration(&self, table: &CalibrationTable) -> StoreResult<()>;

    /// Dates with saved picks, oldest first
    async fn list_dates(&self) -> StoreResult<Vec<NaiveDate>>;
}

/// JSON files under a data directory
#[derive(Debug, Clone)]
pub struct LocalJsonStore {
    root: PathBuf,
}

const PICKS_DIR: &str = "picks";
const GRADED_DIR: &str = "graded";
const CALIBRATION_FILE: &str = "calibration.json";

impl LocalJsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dated_path(&self, dir: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    fn calibration_path(&self) -> PathBuf {
        self.root.join(CALIBRATION_FILE)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path, kind: &'static str) -> StoreResult<Option<T>> {
    let body = match tokio::fs::read_to_string(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|source| StoreError::Serialization {
            kind,
            path: path.display().to_string(),
            source,
        })
}

async fn write_json<T: Serialize + Sync>(path: &Path, kind: &'static str, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }
    let body = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialization {
        kind,
        path: path.display().to_string(),
        source,
    })?;

    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, body).await.map_err(io_err(&tmp))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(path)(e));
    }
    debug!("Wrote {} to {}", kind, path.display());
    Ok(())
}

#[async_trait]
impl PicksStore for LocalJsonStore {
    async fn save_daily(&self, picks: &DailyPicks) -> StoreResult<()> {
        let path = self.dated_path(PICKS_DIR, picks.date);
        write_json(&path, "daily picks", picks).await?;
        info!(
            "Saved {} {} picks for {} (run {})",
            picks.picks.len(),
            picks.sport,
            picks.date,
            picks.run_id
        );
        Ok(())
    }

    async fn load_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyPicks>> {
        read_json(&self.dated_path(PICKS_DIR, date), "daily picks").await
    }

    async fn save_graded(&self, graded: &GradedDay) -> StoreResult<()> {
        write_json(&self.dated_path(GRADED_DIR, graded.date), "graded day", graded).await
    }

    async fn load_graded(&self, date: NaiveDate) -> StoreResult<Option<GradedDay>> {
        read_json(&self.dated_path(GRADED_DIR, date), "graded day").await
    }

    async fn load_calibration(&self) -> StoreResult<CalibrationTable> {
        Ok(read_json(&self.calibration_path(), "calibration")
            .await?
            .unwrap_or_default())
    }

    async fn save_calibration(&self, table: &CalibrationTable) -> StoreResult<()> {
        write_json(&self.calibration_path(), "calibration", table).await
    }

    async fn list_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let dir = self.root.join(PICKS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut dates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&dir))? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }
}

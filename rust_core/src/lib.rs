//! Picks Core - prop-bet probability scoring, calibration and daily picks.
//!
//! This module provides:
//! - Per-market probability models (home run, stolen base, 2+ hits, anytime goal)
//! - Logit blending of model and market probabilities
//! - EWMA calibration learned from graded outcomes
//! - Pick selection, ranking and round-robin unit allocation
//! - Upstream clients (MLB Stats, The Odds API, ESPN) behind circuit breakers
//! - JSON-per-date persistence and the daily generate / backfill operations

pub mod calibration;
pub mod circuit_breaker;
pub mod clients;
pub mod error;
pub mod grading;
pub mod league_config;
pub mod models;
pub mod pipeline;
pub mod probability;
pub mod render;
pub mod round_robin;
pub mod selection;
pub mod store;
pub mod utils;

pub use calibration::CalibrationTable;
pub use error::{ClientError, StoreError};
pub use grading::{backfill, BackfillSummary, CalibrationParams, LiveResults};
pub use models::*;
pub use pipeline::{PicksPipeline, PipelineConfig};
pub use store::{LocalJsonStore, PicksStore};

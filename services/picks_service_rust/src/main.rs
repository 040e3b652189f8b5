use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use picks_rust_core::calibration::calibration_report;
use picks_rust_core::clients::{ClientSettings, EspnClient, MlbStatsClient, OddsApiClient};
use picks_rust_core::grading::graded_history;
use picks_rust_core::probability::PropModelRegistry;
use picks_rust_core::render::{render_json, render_text};
use picks_rust_core::selection::SelectionParams;
use picks_rust_core::{
    backfill, CalibrationParams, LiveResults, LocalJsonStore, PicksPipeline, PicksStore, PipelineConfig,
    Sport,
};

mod config;
mod http;
mod scheduler;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "picks", about = "Daily player-prop picks", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and print picks without saving
    Picks {
        /// YYYY-MM-DD, defaults to today in PICKS_TIMEZONE
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "mlb")]
        sport: Sport,
        /// Print the full JSON document instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Generate and persist the day's picks
    Save {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "mlb")]
        sport: Sport,
    },
    /// Grade a saved day and update calibration (defaults to yesterday)
    Backfill {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print the calibration table and reliability report
    Calibration,
    /// Run the HTTP API
    Serve,
    /// Run the daily save/backfill loop
    Schedule {
        #[arg(long, default_value = "mlb")]
        sport: Sport,
    },
}

struct App {
    config: Config,
    pipeline: Arc<PicksPipeline>,
    results: Arc<LiveResults>,
    calibration: CalibrationParams,
}

impl App {
    fn build(config: Config) -> Result<Self> {
        let settings = ClientSettings {
            timeout: config.http_timeout,
            ..Default::default()
        };
        let mlb = MlbStatsClient::with_base_url(&config.mlb_stats_base_url, &settings);
        let espn = EspnClient::with_base_url(&config.espn_base_url, &settings);
        let odds = match &config.odds_api_key {
            Some(key) => Some(OddsApiClient::with_base_url(key, &config.odds_api_base_url, &settings)),
            None => {
                warn!("ODDS_API_KEY not set; picks will use model probabilities only");
                None
            }
        };

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Creating data dir {}", config.data_dir.display()))?;
        let store = Arc::new(LocalJsonStore::new(&config.data_dir));

        let pipeline_config = PipelineConfig {
            selection: SelectionParams {
                top_n: config.top_n,
                market_weight: config.market_weight,
                ..Default::default()
            },
            round_robin_units: config.round_robin_units,
            round_robin_size: config.round_robin_size,
            concurrency: config.fetch_concurrency,
            ..Default::default()
        };
        let results = Arc::new(LiveResults {
            mlb: mlb.clone(),
            espn: espn.clone(),
            concurrency: config.fetch_concurrency,
        });
        let pipeline = Arc::new(PicksPipeline::new(
            mlb,
            espn,
            odds,
            PropModelRegistry::default(),
            store,
            pipeline_config,
        ));
        let calibration = CalibrationParams {
            alpha: config.calibration_alpha,
            min_samples: config.calibration_min_samples,
        };

        Ok(Self {
            config,
            pipeline,
            results,
            calibration,
        })
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.timezone).date_naive()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let app = App::build(config)?;

    match cli.command {
        Command::Picks { date, sport, json } => {
            let date = date.unwrap_or_else(|| app.today());
            let daily = app.pipeline.generate(date, sport).await?;
            if json {
                println!("{}", render_json(&daily)?);
            } else {
                print!("{}", render_text(&daily));
            }
        }
        Command::Save { date, sport } => {
            let date = date.unwrap_or_else(|| app.today());
            let daily = app.pipeline.save_daily(date, sport).await?;
            info!("Saved {} picks for {}", daily.picks.len(), date);
            print!("{}", render_text(&daily));
        }
        Command::Backfill { date } => {
            let date = date.unwrap_or_else(|| app.today() - Duration::days(1));
            let summary = backfill(
                app.pipeline.store().as_ref(),
                app.results.as_ref(),
                date,
                app.calibration,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Calibration => {
            let store = app.pipeline.store();
            let table = store.load_calibration().await?;
            let report = calibration_report(&graded_history(store.as_ref()).await?);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "table": table, "report": report }))?
            );
        }
        Command::Serve => {
            let state = http::AppState {
                pipeline: app.pipeline.clone(),
                results: app.results.clone(),
                calibration: app.calibration,
                timezone: app.config.timezone,
                started_at: Utc::now(),
            };
            http::serve(state, &app.config.bind_addr).await?;
        }
        Command::Schedule { sport } => {
            let scheduler = scheduler::Scheduler {
                pipeline: app.pipeline.clone(),
                results: app.results.clone(),
                calibration: app.calibration,
                timezone: app.config.timezone,
                save_picks_at: app.config.save_picks_at,
                backfill_at: app.config.backfill_at,
                sport,
            };
            scheduler.run().await;
        }
    }

    Ok(())
}

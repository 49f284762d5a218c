mod api;
mod config;
mod db;
mod error;
mod report;
mod scorer;
mod selector;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::ScoringLatency;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::{LedgerMsg, LedgerWriter, SqliteForecastStore, SqlitePriceSource, SqliteReportSink};
use crate::error::Result;
use crate::report::{CsvReportSink, ReportSink};
use crate::scorer::{CrpsScorer, Evaluator};
use crate::state::ForecastStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!(kind = %e.kind(), "Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let sim = &cfg.simulation;
    info!(
        asset = %sim.asset,
        time_increment = sim.time_increment,
        time_length = sim.time_length,
        num_simulations = sim.num_simulations,
        sigma = sim.sigma,
        "Scoring ensembles of {} points at {}s cadence",
        sim.expected_points(),
        sim.time_increment,
    );

    // --- Forecast store + realized prices ---
    let store: Arc<dyn ForecastStore> =
        Arc::new(SqliteForecastStore::new(pool.clone(), cfg.cadence()));
    let participants = store.participants().await?;
    info!("Forecast store has {} participants", participants.len());

    let prices = Arc::new(SqlitePriceSource::new(pool.clone()));

    // --- Report sinks ---
    let mut sinks: Vec<Arc<dyn ReportSink>> = vec![Arc::new(SqliteReportSink::new(pool.clone()))];
    match &cfg.report_dir {
        Some(dir) => {
            sinks.push(Arc::new(CsvReportSink::new(dir).await?));
            info!("CSV ledgers will be written to {dir}");
        }
        None => warn!("REPORT_DIR not set: ledgers are only stored in the database"),
    }

    // --- Channels ---
    let (ledger_tx, ledger_rx) = mpsc::channel::<LedgerMsg>(CHANNEL_CAPACITY);

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(ScoringLatency::new());

    // --- Spawn tasks ---

    // Ledger writer (single writer for every sink)
    let writer = LedgerWriter::new(sinks, ledger_rx, Arc::clone(&health));
    tokio::spawn(async move { writer.run().await });

    // Evaluator (background, every EVAL_INTERVAL_SECS)
    let policy = cfg.selection_policy();
    let scorer = CrpsScorer::new(cfg.scoring_horizons(), cfg.cadence());
    info!(
        horizon_secs = policy.horizon.num_seconds(),
        lookback_secs = policy.lookback.num_seconds(),
        horizons = scorer.horizons().len(),
        workers = cfg.eval_workers,
        "Evaluator every {}s",
        cfg.eval_interval_secs,
    );
    let evaluator = Evaluator::new(
        store,
        prices,
        scorer,
        policy,
        sim.asset.clone(),
        cfg.eval_workers,
        Duration::from_secs(cfg.eval_interval_secs),
        ledger_tx,
        Arc::clone(&health),
        Arc::clone(&latency),
    );
    let latest = evaluator.latest();
    tokio::spawn(async move { evaluator.run().await });

    // HTTP API server
    let api_state = ApiState { pool: pool.clone(), health, latency, latest };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

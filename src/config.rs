use chrono::Duration;

use crate::error::{AppError, Result};
use crate::scorer::ScoringHorizon;
use crate::selector::SelectionPolicy;
use crate::types::SimulationParams;

/// Channel capacity for ledgers queued to the writer task.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Horizons every forecast is scored on, in ledger order: (label, seconds).
pub const SCORING_HORIZONS: &[(&str, i64)] = &[
    ("5min", 300),
    ("30min", 1_800),
    ("3hour", 10_800),
    ("24hour", 86_400),
];

/// Maturity period after submission before a forecast may be scored.
pub const DEFAULT_HORIZON_SECS: i64 = 24 * 3_600;

/// Maximum staleness between horizon completion and evaluation.
pub const DEFAULT_LOOKBACK_SECS: i64 = 5 * 24 * 3_600;

/// Upper bound for HORIZON_SECS and LOOKBACK_SECS (ten years).
pub const MAX_WINDOW_SECS: i64 = 10 * 365 * 24 * 3_600;

/// Evaluation cycle interval (seconds).
pub const DEFAULT_EVAL_INTERVAL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Directory for per-participant CSV ledgers (REPORT_DIR). Unset disables the CSV sink.
    pub report_dir: Option<String>,
    /// Simulator configuration the ingested ensembles were produced with.
    pub simulation: SimulationParams,
    /// HORIZON_SECS
    pub horizon_secs: i64,
    /// LOOKBACK_SECS
    pub lookback_secs: i64,
    /// EVAL_INTERVAL_SECS
    pub eval_interval_secs: u64,
    /// Participants scored concurrently per cycle (EVAL_WORKERS)
    pub eval_workers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "validator.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            report_dir: std::env::var("REPORT_DIR").ok().filter(|s| !s.trim().is_empty()),
            simulation: SimulationParams {
                asset: std::env::var("ASSET").unwrap_or_else(|_| "BTC".to_string()),
                time_increment: parse_env("TIME_INCREMENT_SECS", 300)?,
                time_length: parse_env("TIME_LENGTH_SECS", 86_400)?,
                num_simulations: parse_env("NUM_SIMULATIONS", 100)?,
                sigma: std::env::var("SIGMA")
                    .unwrap_or_else(|_| "0.01".to_string())
                    .parse::<f64>()
                    .unwrap_or(0.01),
            },
            horizon_secs: parse_env("HORIZON_SECS", DEFAULT_HORIZON_SECS)?,
            lookback_secs: parse_env("LOOKBACK_SECS", DEFAULT_LOOKBACK_SECS)?,
            eval_interval_secs: parse_env("EVAL_INTERVAL_SECS", DEFAULT_EVAL_INTERVAL_SECS)?,
            eval_workers: std::env::var("EVAL_WORKERS")
                .unwrap_or_else(|_| "8".to_string())
                .parse::<usize>()
                .unwrap_or(8)
                .max(1),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.simulation.time_increment <= 0 {
            return Err(AppError::Config("TIME_INCREMENT_SECS must be positive".to_string()));
        }
        if self.simulation.time_length < self.simulation.time_increment {
            return Err(AppError::Config(
                "TIME_LENGTH_SECS must be at least TIME_INCREMENT_SECS".to_string(),
            ));
        }
        if self.horizon_secs < 0 || self.lookback_secs < 0 {
            return Err(AppError::Config(
                "HORIZON_SECS and LOOKBACK_SECS must not be negative".to_string(),
            ));
        }
        if self.horizon_secs > MAX_WINDOW_SECS || self.lookback_secs > MAX_WINDOW_SECS {
            return Err(AppError::Config(format!(
                "HORIZON_SECS and LOOKBACK_SECS must not exceed {MAX_WINDOW_SECS}"
            )));
        }
        if self.eval_interval_secs == 0 {
            return Err(AppError::Config("EVAL_INTERVAL_SECS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn cadence(&self) -> Duration {
        self.simulation.cadence()
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            horizon: Duration::seconds(self.horizon_secs),
            lookback: Duration::seconds(self.lookback_secs),
        }
    }

    pub fn scoring_horizons(&self) -> Vec<ScoringHorizon> {
        SCORING_HORIZONS
            .iter()
            .map(|&(label, secs)| ScoringHorizon::new(label, Duration::seconds(secs)))
            .collect()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

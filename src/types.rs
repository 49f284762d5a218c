use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Every timestamp inside the validator is UTC-normalized.
pub type Timestamp = DateTime<Utc>;

// ---------------------------------------------------------------------------
// Price paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: Timestamp,
    pub price: f64,
}

impl PricePoint {
    pub fn new(time: Timestamp, price: f64) -> Self {
        Self { time, price }
    }
}

/// One trajectory: points at a fixed cadence, strictly increasing in time.
pub type PricePath = Vec<PricePoint>;

// ---------------------------------------------------------------------------
// Forecasts
// ---------------------------------------------------------------------------

/// One submitted forecast: an ensemble of simulated trajectories that share
/// cadence, length and timestamps. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Store-assigned, strictly increasing with append order.
    pub seq: u64,
    pub participant_id: String,
    pub submitted_at: Timestamp,
    pub paths: Vec<PricePath>,
}

impl ForecastRecord {
    /// Number of simulated trajectories (M).
    pub fn ensemble_size(&self) -> usize {
        self.paths.len()
    }

    /// Points per trajectory (N).
    pub fn path_len(&self) -> usize {
        self.paths.first().map(Vec::len).unwrap_or(0)
    }

    /// Timestamps of the trajectory grid, taken from the first path.
    pub fn timeline(&self) -> Vec<Timestamp> {
        self.paths
            .first()
            .map(|p| p.iter().map(|pt| pt.time).collect())
            .unwrap_or_default()
    }
}

/// Configuration the external simulator produced the ensemble with.
/// Only the cadence and the asset are read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub asset: String,
    /// Cadence between consecutive points, seconds.
    pub time_increment: i64,
    /// Total simulated horizon, seconds.
    pub time_length: i64,
    pub num_simulations: usize,
    pub sigma: f64,
}

impl SimulationParams {
    pub fn cadence(&self) -> Duration {
        Duration::seconds(self.time_increment)
    }

    /// Points per simulated trajectory, start point included.
    pub fn expected_points(&self) -> usize {
        (self.time_length / self.time_increment) as usize + 1
    }
}

// ---------------------------------------------------------------------------
// Score ledger
// ---------------------------------------------------------------------------

/// Label of the final ledger row.
pub const OVERALL_LABEL: &str = "Overall";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    /// 1-based index of the change window within a horizon.
    Index(usize),
    Total,
}

impl std::fmt::Display for Increment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Increment::Index(i) => write!(f, "{i}"),
            Increment::Total => write!(f, "Total"),
        }
    }
}

// Serialized the way the audit CSV writes it: a bare number or "Total".
impl Serialize for Increment {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Increment::Index(i) => s.serialize_u64(*i as u64),
            Increment::Total => s.serialize_str("Total"),
        }
    }
}

impl<'de> Deserialize<'de> for Increment {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Label(String),
        }
        match Raw::deserialize(d)? {
            Raw::Index(i) => Ok(Increment::Index(i)),
            Raw::Label(s) if s == "Total" => Ok(Increment::Total),
            Raw::Label(s) => Err(serde::de::Error::custom(format!(
                "expected an index or \"Total\", got {s:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub label: String,
    pub increment: Increment,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreLedger {
    pub participant_id: String,
    pub evaluated_at: Timestamp,
    pub rows: Vec<LedgerRow>,
}

impl ScoreLedger {
    /// Ledgers are namespaced by (participant, UTC day of evaluation).
    pub fn day(&self) -> NaiveDate {
        self.evaluated_at.date_naive()
    }

    pub fn overall_total(&self) -> Option<f64> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.label == OVERALL_LABEL && r.increment == Increment::Total)
            .map(|r| r.score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub participant_id: String,
    /// (horizon label, total), in configured horizon order.
    pub per_horizon_total: Vec<(String, f64)>,
    /// Loss: lower is better.
    pub overall_total: f64,
}

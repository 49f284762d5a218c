pub mod csv;

pub use self::csv::CsvReportSink;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ScoreLedger, ScoreSummary};

/// Persists score ledgers for audit, one unit per (participant, UTC day).
///
/// Writing the same unit again replaces it: the latest cycle is authoritative.
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write_ledger(&self, ledger: &ScoreLedger, summary: &ScoreSummary) -> Result<()>;
}

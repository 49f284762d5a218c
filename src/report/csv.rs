use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::report::ReportSink;
use crate::types::{ScoreLedger, ScoreSummary};

/// Writes `crps_scores_{participant}_{day}.csv` into a report directory.
///
/// The file is written next to its final name and renamed into place, so a
/// reader sees either the previous ledger or the new one, never a mix.
pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, ledger: &ScoreLedger) -> PathBuf {
        self.dir.join(file_name(ledger))
    }
}

fn file_name(ledger: &ScoreLedger) -> String {
    let safe: String = ledger
        .participant_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("crps_scores_{safe}_{}.csv", ledger.day().format("%Y-%m-%d"))
}

pub fn render_csv(ledger: &ScoreLedger) -> String {
    let mut out = String::from("Interval,Increment,CRPS\n");
    for row in &ledger.rows {
        let _ = writeln!(out, "{},{},{}", row.label, row.increment, row.score);
    }
    out
}

async fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ReportSink for CsvReportSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn write_ledger(&self, ledger: &ScoreLedger, _summary: &ScoreSummary) -> Result<()> {
        replace_file(&self.path_for(ledger), &render_csv(ledger)).await
    }
}

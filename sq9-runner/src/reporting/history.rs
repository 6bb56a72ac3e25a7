//! Session history: JSONL append-only log, one line per finished session.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sq9_core::{Direction, Summary, TradeMode};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::warn;

use super::ReportSink;
use crate::metrics::PerformanceMetrics;
use crate::report::SessionReport;

/// A compact snapshot of a session, without ledger or curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    pub symbol: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub trade_mode: TradeMode,
    pub direction: Direction,
    pub summary: Summary,
    pub metrics: PerformanceMetrics,
    pub halted: bool,
    pub synthetic: bool,
}

impl From<&SessionReport> for HistoryEntry {
    fn from(report: &SessionReport) -> Self {
        Self {
            session_id: report.session_id.clone(),
            symbol: report.symbol.clone(),
            started_at: report.started_at,
            ended_at: report.ended_at,
            trade_mode: report.config.trade_mode,
            direction: report.config.direction,
            summary: report.summary.clone(),
            metrics: report.metrics.clone(),
            halted: report.halted.is_some(),
            synthetic: report.is_synthetic(),
        }
    }
}

/// Appends one [`HistoryEntry`] per published report.
#[derive(Debug, Clone)]
pub struct HistorySink {
    path: PathBuf,
}

impl HistorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let json = serde_json::to_string(entry).context("Failed to serialize history entry")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history {}", self.path.display()))?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }

    /// Read all entries. Malformed lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("Failed to open history {}", self.path.display()))?;

        let mut entries = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping malformed history line"),
            }
        }
        Ok(entries)
    }
}

impl ReportSink for HistorySink {
    fn name(&self) -> &str {
        "history"
    }

    fn publish(&self, report: &SessionReport) -> Result<()> {
        self.append(&HistoryEntry::from(report))
    }
}

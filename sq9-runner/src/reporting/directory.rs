//! Per-session artifact directory: JSON report, CSV ledgers, Markdown summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::markdown::render_markdown;
use super::ReportSink;
use crate::report::SessionReport;

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub report_json: PathBuf,
    pub trades_csv: PathBuf,
    pub partial_exits_csv: PathBuf,
    pub report_markdown: PathBuf,
}

/// Writes each report into `<root>/<session_id>/`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, report: &SessionReport) -> Result<ReportPaths> {
        let dir = self.root.join(&report.session_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let paths = ReportPaths {
            report_json: dir.join("report.json"),
            trades_csv: dir.join("trades.csv"),
            partial_exits_csv: dir.join("partial_exits.csv"),
            report_markdown: dir.join("report.md"),
            dir,
        };

        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        std::fs::write(&paths.report_json, json).with_context(|| {
            format!("Failed to write report JSON {}", paths.report_json.display())
        })?;

        write_trades_csv(&paths.trades_csv, report)?;
        write_partial_exits_csv(&paths.partial_exits_csv, report)?;

        std::fs::write(&paths.report_markdown, render_markdown(report)).with_context(|| {
            format!(
                "Failed to write Markdown report {}",
                paths.report_markdown.display()
            )
        })?;

        Ok(paths)
    }
}

impl ReportSink for DirectorySink {
    fn name(&self) -> &str {
        "directory"
    }

    fn publish(&self, report: &SessionReport) -> Result<()> {
        self.write(report).map(|_| ())
    }
}

#[derive(Serialize)]
struct TradeRow<'a> {
    trade_number: usize,
    direction: String,
    entry_time: String,
    entry_price: f64,
    exit_time: String,
    exit_price: f64,
    quantity: u64,
    gross_pnl: f64,
    costs: f64,
    net_pnl: f64,
    result: &'a str,
    capital_after: f64,
    partial_exits: usize,
}

#[derive(Serialize)]
struct PartialExitRow {
    trade_number: usize,
    target: usize,
    time: String,
    price: f64,
    quantity: u64,
    gross_pnl: f64,
    costs: f64,
    net_pnl: f64,
}

fn write_trades_csv(path: &Path, report: &SessionReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create trades CSV {}", path.display()))?;
    for trade in &report.ledger {
        writer
            .serialize(TradeRow {
                trade_number: trade.trade_number,
                direction: trade.direction.to_string(),
                entry_time: trade.entry_time.to_string(),
                entry_price: trade.entry_price,
                exit_time: trade.exit_time.to_string(),
                exit_price: trade.exit_price,
                quantity: trade.quantity,
                gross_pnl: trade.gross_pnl,
                costs: trade.costs,
                net_pnl: trade.net_pnl,
                result: &trade.result,
                capital_after: trade.capital_after,
                partial_exits: trade.partial_exits.len(),
            })
            .context("Failed to write trade row")?;
    }
    if report.ledger.is_empty() {
        writer
            .write_record([
                "trade_number", "direction", "entry_time", "entry_price", "exit_time",
                "exit_price", "quantity", "gross_pnl", "costs", "net_pnl", "result",
                "capital_after", "partial_exits",
            ])
            .context("Failed to write trades CSV header")?;
    }
    writer.flush().context("Failed to flush trades CSV")?;
    Ok(())
}

fn write_partial_exits_csv(path: &Path, report: &SessionReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create partial exits CSV {}", path.display()))?;
    let mut rows = 0;
    for trade in &report.ledger {
        for leg in &trade.partial_exits {
            writer
                .serialize(PartialExitRow {
                    trade_number: trade.trade_number,
                    target: leg.target,
                    time: leg.time.to_string(),
                    price: leg.price,
                    quantity: leg.quantity,
                    gross_pnl: leg.gross_pnl,
                    costs: leg.costs,
                    net_pnl: leg.net_pnl,
                })
                .context("Failed to write partial exit row")?;
            rows += 1;
        }
    }
    if rows == 0 {
        writer
            .write_record([
                "trade_number", "target", "time", "price", "quantity", "gross_pnl", "costs",
                "net_pnl",
            ])
            .context("Failed to write partial exits CSV header")?;
    }
    writer.flush().context("Failed to flush partial exits CSV")?;
    Ok(())
}

//! Persisted session report: everything a backtest or paper session produced.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sq9_core::data::{DataSource, Interval};
use sq9_core::engine::{BreakerTrip, EquityPoint, LevelSnapshot};
use sq9_core::{
    Bar, BenchmarkComparison, BuyAndHold, ClosedTrade, Position, SessionConfig, SimulationResult,
    Summary,
};

use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// The bars the session actually saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub first_bar: Option<NaiveDateTime>,
    pub last_bar: Option<NaiveDateTime>,
    pub bars: usize,
    pub interval: Interval,
    pub source: DataSource,
}

impl ReportWindow {
    pub fn from_bars(bars: &[Bar], interval: Interval, source: DataSource) -> Self {
        Self {
            first_bar: bars.first().map(|b| b.timestamp),
            last_bar: bars.last().map(|b| b.timestamp),
            bars: bars.len(),
            interval,
            source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub session_id: String,
    pub symbol: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub config: SessionConfig,
    pub window: ReportWindow,
    pub summary: Summary,
    pub metrics: PerformanceMetrics,
    #[serde(default)]
    pub benchmark: Option<BuyAndHold>,
    #[serde(default)]
    pub comparison: Option<BenchmarkComparison>,
    pub ledger: Vec<ClosedTrade>,
    #[serde(default)]
    pub open_position: Option<Position>,
    pub level_history: Vec<LevelSnapshot>,
    pub equity_curve: Vec<EquityPoint>,
    #[serde(default)]
    pub halted: Option<BreakerTrip>,
    #[serde(default)]
    pub dataset_hash: Option<String>,
}

impl SessionReport {
    /// Build a report from a finished simulation. Benchmark and dataset hash
    /// are attached separately when the bars are known.
    pub fn new(
        result: SimulationResult,
        window: ReportWindow,
        started_at: NaiveDateTime,
        ended_at: NaiveDateTime,
    ) -> Self {
        let metrics = PerformanceMetrics::compute(&result.ledger, &result.equity_curve);
        let config = result.config;
        Self {
            schema_version: SCHEMA_VERSION,
            session_id: session_id(&config, started_at),
            symbol: config.symbol.clone(),
            started_at,
            ended_at,
            window,
            summary: result.summary,
            metrics,
            benchmark: None,
            comparison: None,
            ledger: result.ledger,
            open_position: result.open_position,
            level_history: result.level_history,
            equity_curve: result.equity_curve,
            halted: result.halted,
            dataset_hash: None,
            config,
        }
    }

    /// Attach a buy-and-hold benchmark over `bars` with the session's capital and costs.
    pub fn with_benchmark(mut self, bars: &[Bar]) -> Self {
        self.benchmark =
            BuyAndHold::compute(bars, self.config.initial_capital, &self.config.costs);
        self.comparison = self
            .benchmark
            .as_ref()
            .map(|b| BenchmarkComparison::new(&self.summary, b));
        self
    }

    pub fn with_dataset_hash(mut self, hash: impl Into<String>) -> Self {
        self.dataset_hash = Some(hash.into());
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.window.source == DataSource::Synthetic
    }
}

/// `SYMBOL_<YYYYmmdd_HHMMSS>_<first 8 hex chars of blake3(config json)>`.
pub fn session_id(config: &SessionConfig, started_at: NaiveDateTime) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let hash = blake3::hash(json.as_bytes()).to_hex();
    format!(
        "{}_{}_{}",
        config.symbol,
        started_at.format("%Y%m%d_%H%M%S"),
        &hash[..8]
    )
}

//! sq9 runner: backtest orchestration, live paper sessions, metrics, reports.
//!
//! This crate builds on `sq9-core` to provide:
//! - Data loading with validation and synthetic fallback
//! - Single-symbol backtests and parallel multi-symbol batches
//! - Live paper trading with a stop handle and trading window
//! - Performance metrics over the ledger and equity curve
//! - Session reports and fire-and-forget report sinks (artifact directory, JSONL history)

pub mod backtest;
pub mod data_loader;
pub mod metrics;
pub mod paper;
pub mod report;
pub mod reporting;

pub use backtest::{
    backtest_bars, run_backtest, run_batch, BatchResult, DataConfig, RunConfig, RunError,
    SourceKind,
};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
pub use metrics::PerformanceMetrics;
pub use paper::{
    Clock, PaperConfig, PaperSession, PollOutcome, PollSettings, SessionWindow, StopHandle,
    SystemClock, STOP_CHECK_SLICE,
};
pub use report::{ReportWindow, SessionReport, SCHEMA_VERSION};
pub use reporting::{
    publish_report, DirectorySink, HistoryEntry, HistorySink, ReportPaths, ReportSink,
};

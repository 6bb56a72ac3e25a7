//! Backtest orchestration: load bars, simulate, benchmark, score, report.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sq9_core::data::{
    BarRequest, CsvProvider, DataError, DataProvider, DataSource, Interval, Period, RequestGate,
    SyntheticProvider, YahooProvider,
};
use sq9_core::{run_simulation, Bar, ConfigError, SessionConfig, SimulationError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::data_loader::{load_bars, LoadError, LoadOptions};
use crate::paper::PaperConfig;
use crate::report::{ReportWindow, SessionReport};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid run config: {0}")]
    InvalidRun(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("data error: {0}")]
    Load(#[from] LoadError),

    #[error("provider error: {0}")]
    Provider(#[from] DataError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Which provider feeds the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

/// The `[data]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub interval: Interval,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Used when `start`/`end` are absent.
    pub period: Period,
    pub source: SourceKind,
    /// Directory of `<SYMBOL>.csv` files for `source = "csv"`.
    pub csv_dir: Option<PathBuf>,
    /// Generate synthetic bars when the provider fails.
    pub synthetic_fallback: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Minute15,
            start: None,
            end: None,
            period: Period::Month1,
            source: SourceKind::Yahoo,
            csv_dir: None,
            synthetic_fallback: false,
        }
    }
}

impl DataConfig {
    pub fn request(&self) -> Result<BarRequest, RunError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => {
                Ok(BarRequest::between(self.interval, start, end))
            }
            (Some(start), Some(end)) => Err(RunError::InvalidRun(format!(
                "start {start} is after end {end}"
            ))),
            (None, None) => Ok(BarRequest::recent(self.interval, self.period)),
            _ => Err(RunError::InvalidRun(
                "start and end must be given together".into(),
            )),
        }
    }

    /// Build the configured provider. `today` anchors synthetic `Recent` windows.
    pub fn provider(&self, today: NaiveDate) -> Result<Box<dyn DataProvider>, RunError> {
        let provider: Box<dyn DataProvider> = match self.source {
            SourceKind::Yahoo => Box::new(YahooProvider::new(Arc::new(
                RequestGate::default_provider(),
            ))?),
            SourceKind::Csv => {
                let dir = self.csv_dir.as_ref().ok_or_else(|| {
                    RunError::InvalidRun("source = \"csv\" requires csv_dir".into())
                })?;
                Box::new(CsvProvider::new(dir))
            }
            SourceKind::Synthetic => Box::new(SyntheticProvider::new(today)),
        };
        Ok(provider)
    }
}

/// A full run file: `[session]`, `[data]` and an optional `[paper]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub session: SessionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub paper: Option<PaperConfig>,
}

impl RunConfig {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            data: DataConfig::default(),
            paper: None,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, RunError> {
        let config: RunConfig = toml::from_str(content)?;
        config.session.validate()?;
        config.data.request()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, RunError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}

/// Run a single backtest: load → simulate → benchmark → report.
pub fn run_backtest(
    config: &RunConfig,
    provider: &dyn DataProvider,
    today: NaiveDate,
) -> Result<SessionReport, RunError> {
    let session = config.session.clone().normalized()?;
    let opts = LoadOptions {
        request: config.data.request()?,
        synthetic_fallback: config.data.synthetic_fallback,
        today,
    };
    let loaded = load_bars(&session.symbol, provider, &opts)?;
    let report = backtest_bars(session, &loaded.bars, config.data.interval, loaded.source)?
        .with_dataset_hash(loaded.dataset_hash);
    Ok(report)
}

/// Run a backtest over pre-loaded bars. No I/O.
pub fn backtest_bars(
    session: SessionConfig,
    bars: &[Bar],
    interval: Interval,
    source: DataSource,
) -> Result<SessionReport, RunError> {
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(f), Some(l)) => (f.timestamp, l.timestamp),
        _ => return Err(SimulationError::NoData.into()),
    };
    let result = run_simulation(session, bars)?;
    let window = ReportWindow::from_bars(bars, interval, source);
    Ok(SessionReport::new(result, window, first, last).with_benchmark(bars))
}

/// One symbol's outcome in a batch.
#[derive(Debug)]
pub struct BatchResult {
    pub symbol: String,
    pub outcome: Result<SessionReport, RunError>,
}

/// Run the same configuration over several symbols in parallel.
///
/// Each symbol gets an independent simulation context. Failures are
/// reported per symbol and do not affect the others.
pub fn run_batch(
    config: &RunConfig,
    symbols: &[String],
    provider: &dyn DataProvider,
    today: NaiveDate,
) -> Vec<BatchResult> {
    info!(symbols = symbols.len(), "batch started");
    symbols
        .par_iter()
        .map(|symbol| {
            let mut cfg = config.clone();
            cfg.session.symbol = symbol.clone();
            BatchResult {
                symbol: symbol.clone(),
                outcome: run_backtest(&cfg, provider, today),
            }
        })
        .collect()
}

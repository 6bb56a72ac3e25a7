//! Bar loading for the runner.
//!
//! Fallback policy:
//! 1. Ask the configured provider for the requested window
//! 2. If that fails and synthetic fallback is enabled, generate synthetic bars (tagged)
//! 3. Otherwise fail with the provider's error
//!
//! Whatever the source, the series is cleaned before it reaches the engine:
//! void and insane bars are dropped, and timestamps must be strictly increasing.

use chrono::{NaiveDate, NaiveDateTime};
use sq9_core::data::{generate_synthetic_bars, BarRequest, DataError, DataProvider, DataSource};
use sq9_core::Bar;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no usable bars for '{symbol}' (use --synthetic for synthetic data)")]
    Empty { symbol: String },

    #[error("bars for '{symbol}' are not strictly increasing: {current} follows {previous}")]
    OutOfOrder {
        symbol: String,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub request: BarRequest,
    /// Generate synthetic bars when the provider fails.
    pub synthetic_fallback: bool,
    /// Anchor for `Recent` windows when falling back to synthetic data.
    pub today: NaiveDate,
}

/// Cleaned bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// BLAKE3 over every bar, hex encoded.
    pub dataset_hash: String,
    /// Bars removed as void or insane.
    pub dropped: usize,
}

impl LoadedData {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.bars.last().map(Bar::trading_day)
    }
}

/// Load and clean bars for one symbol.
pub fn load_bars(
    symbol: &str,
    provider: &dyn DataProvider,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let (raw, source) = match provider.fetch(symbol, &opts.request) {
        Ok(fetched) => (fetched.bars, fetched.source),
        Err(e) if opts.synthetic_fallback => {
            warn!(
                symbol,
                provider = provider.name(),
                error = %e,
                "provider failed, generating synthetic bars; results are tagged as synthetic"
            );
            let (start, end) = opts.request.window(opts.today);
            let bars = generate_synthetic_bars(symbol, opts.request.interval, start, end);
            (bars, DataSource::Synthetic)
        }
        Err(e) => return Err(e.into()),
    };

    let (bars, dropped) = clean_bars(symbol, raw)?;
    let dataset_hash = dataset_hash(symbol, &bars);
    info!(
        symbol,
        bars = bars.len(),
        dropped,
        source = ?source,
        "bars loaded"
    );

    Ok(LoadedData {
        symbol: symbol.to_string(),
        bars,
        source,
        dataset_hash,
        dropped,
    })
}

/// Drop void/insane bars and check ordering. Returns the kept bars and the drop count.
pub fn clean_bars(symbol: &str, raw: Vec<Bar>) -> Result<(Vec<Bar>, usize), LoadError> {
    let total = raw.len();
    let bars: Vec<Bar> = raw
        .into_iter()
        .filter(|b| !b.is_void() && b.is_sane())
        .collect();
    let dropped = total - bars.len();
    if dropped > 0 {
        warn!(symbol, dropped, "dropped void or malformed bars");
    }

    for pair in bars.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(LoadError::OutOfOrder {
                symbol: symbol.to_string(),
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            symbol: symbol.to_string(),
        });
    }
    Ok((bars, dropped))
}

/// Deterministic BLAKE3 hash over the symbol and every bar's timestamp and OHLCV.
pub fn dataset_hash(symbol: &str, bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    for bar in bars {
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

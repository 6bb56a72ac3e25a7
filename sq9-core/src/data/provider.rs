//! Market-data collaborator trait, request shape and structured errors.
//!
//! The DataProvider trait abstracts over data sources (Yahoo Finance, CSV
//! files, synthetic series) so the backtest and live session can swap
//! implementations and tests can script one.

use crate::domain::Bar;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no bars returned for '{symbol}'")]
    NoData { symbol: String },

    #[error("data temporarily unavailable: {0}")]
    DataUnavailable(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("requests blocked for {remaining_secs}s after repeated provider failures")]
    GateClosed { remaining_secs: u64 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl DataError {
    /// Transient failures: the caller keeps its last known price and retries later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::DataUnavailable(_)
                | DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::GateClosed { .. }
        )
    }
}

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[default]
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Minute60 => "60m",
            Interval::Day1 => "1d",
        }
    }

    pub fn minutes(self) -> i64 {
        match self {
            Interval::Minute1 => 1,
            Interval::Minute5 => 5,
            Interval::Minute15 => 15,
            Interval::Minute30 => 30,
            Interval::Minute60 => 60,
            Interval::Day1 => 24 * 60,
        }
    }

    pub fn is_intraday(self) -> bool {
        self != Interval::Day1
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Interval::Minute1),
            "5m" => Some(Interval::Minute5),
            "15m" => Some(Interval::Minute15),
            "30m" => Some(Interval::Minute30),
            "60m" | "1h" => Some(Interval::Minute60),
            "1d" => Some(Interval::Day1),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look-back period for "most recent" requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "1y")]
    Year1,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day1 => "1d",
            Period::Day5 => "5d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Year1 => "1y",
        }
    }

    /// Calendar days covered.
    pub fn days(self) -> i64 {
        match self {
            Period::Day1 => 1,
            Period::Day5 => 5,
            Period::Month1 => 30,
            Period::Month3 => 91,
            Period::Year1 => 365,
        }
    }
}

/// Which bars to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarRange {
    /// Inclusive calendar-date window.
    Between { start: NaiveDate, end: NaiveDate },
    /// The most recent period, ending now.
    Recent(Period),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRequest {
    pub interval: Interval,
    pub range: BarRange,
}

impl BarRequest {
    pub fn between(interval: Interval, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            interval,
            range: BarRange::Between { start, end },
        }
    }

    pub fn recent(interval: Interval, period: Period) -> Self {
        Self {
            interval,
            range: BarRange::Recent(period),
        }
    }

    /// Inclusive date window, resolving `Recent` against `today`.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self.range {
            BarRange::Between { start, end } => (start, end),
            BarRange::Recent(period) => (today - Duration::days(period.days() - 1), today),
        }
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Synthetic,
    Scripted,
}

/// Result of a successful fetch for one symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
}

/// Supplies ordered bars for a symbol.
///
/// An empty series is reported as `NoData`, never as `Ok` with no bars.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn fetch(&self, symbol: &str, request: &BarRequest) -> Result<FetchResult, DataError>;

    /// Whether the provider is currently accepting requests.
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(DataError::DataUnavailable("x".into()).is_retryable());
        assert!(DataError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(!DataError::NoData { symbol: "X".into() }.is_retryable());
        assert!(!DataError::SymbolNotFound { symbol: "X".into() }.is_retryable());
    }

    #[test]
    fn interval_parse_and_display() {
        assert_eq!(Interval::parse("5m"), Some(Interval::Minute5));
        assert_eq!(Interval::parse("1h"), Some(Interval::Minute60));
        assert_eq!(Interval::parse("2m"), None);
        assert_eq!(Interval::Day1.to_string(), "1d");
        assert!(!Interval::Day1.is_intraday());
    }

    #[test]
    fn interval_serde_uses_short_names() {
        let json = serde_json::to_string(&Interval::Minute15).unwrap();
        assert_eq!(json, "\"15m\"");
        let back: Interval = serde_json::from_str("\"60m\"").unwrap();
        assert_eq!(back, Interval::Minute60);
    }

    #[test]
    fn recent_window_ends_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let req = BarRequest::recent(Interval::Minute5, Period::Day5);
        assert_eq!(
            req.window(today),
            (NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(), today)
        );
    }
}

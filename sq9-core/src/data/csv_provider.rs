//! CSV file provider: the offline path when Yahoo is unavailable.
//!
//! Reads `<dir>/<SYMBOL>.csv` with a `timestamp,open,high,low,close[,volume]`
//! header. Timestamps may be `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
//! or a bare date (midnight). The file's own granularity is used as-is;
//! the request's interval is not resampled.

use super::provider::{BarRange, BarRequest, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Read every bar in a CSV file, in file order.
    pub fn read_file(path: &Path) -> Result<Vec<Bar>, DataError> {
        let io_err = |e: &dyn std::fmt::Display| DataError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| io_err(&e))?;

        let mut bars = Vec::new();
        for (line, record) in reader.deserialize::<CsvRecord>().enumerate() {
            let record = record.map_err(|e| DataError::Malformed(format!("row {}: {e}", line + 1)))?;
            let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| {
                DataError::Malformed(format!("row {}: bad timestamp '{}'", line + 1, record.timestamp))
            })?;
            bars.push(Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume.unwrap_or(0),
            });
        }
        Ok(bars)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbol: &str, request: &BarRequest) -> Result<FetchResult, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let all = Self::read_file(&path)?;

        // Recent windows are anchored to the file's last bar, not the wall clock.
        let (start, end) = match request.range {
            BarRange::Between { start, end } => (start, end),
            BarRange::Recent(period) => match all.last() {
                Some(last) => {
                    let end = last.trading_day();
                    (end - Duration::days(period.days() - 1), end)
                }
                None => {
                    return Err(DataError::NoData {
                        symbol: symbol.to_string(),
                    })
                }
            },
        };

        let bars: Vec<Bar> = all
            .into_iter()
            .filter(|b| (start..=end).contains(&b.trading_day()))
            .collect();
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvImport,
        })
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

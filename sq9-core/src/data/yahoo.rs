//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from the v8 chart API for any supported interval.
//! Timestamps are shifted by the exchange's `gmtoffset` so bars carry
//! exchange-local time and group into the right trading day.
//!
//! Yahoo has no official API and changes format without notice. The CSV
//! provider is the offline fallback.

use super::gate::RequestGate;
use super::provider::{BarRange, BarRequest, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Option<Vec<Option<u64>>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    gate: Arc<RequestGate>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(gate: Arc<RequestGate>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            gate,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, request: &BarRequest) -> String {
        let interval = request.interval.as_str();
        match request.range {
            BarRange::Recent(period) => format!(
                "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
                 ?interval={interval}&range={}",
                period.as_str()
            ),
            BarRange::Between { start, end } => {
                let start_ts = day_start_ts(start);
                // period2 is exclusive
                let end_ts = day_start_ts(end) + 24 * 60 * 60;
                format!(
                    "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
                     ?period1={start_ts}&period2={end_ts}&interval={interval}"
                )
            }
        }
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<Bar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        // Market closed / no trades yet: Yahoo omits timestamps entirely.
        let timestamps = data.timestamp.unwrap_or_default();

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                // Yahoo pads gaps with nulls
                continue;
            };
            let volume = quote
                .volume
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .unwrap_or(0);

            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn fetch_with_retry(&self, symbol: &str, request: &BarRequest) -> Result<Vec<Bar>, DataError> {
        let url = Self::chart_url(symbol, request);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, ?delay, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            if !self.gate.is_open() {
                return Err(DataError::GateClosed {
                    remaining_secs: self.gate.remaining_cooldown().as_secs(),
                });
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                warn!(symbol, "Yahoo returned 403, closing request gate");
                self.gate.close();
                return Err(DataError::GateClosed {
                    remaining_secs: self.gate.remaining_cooldown().as_secs(),
                });
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.gate.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                self.gate.record_failure();
                last_error = Some(DataError::DataUnavailable(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            let bars = Self::parse_response(symbol, chart)?;
            self.gate.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::DataUnavailable("max retries exceeded".into())))
    }
}

fn day_start_ts(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, request: &BarRequest) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, request)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.gate.is_open()
    }
}

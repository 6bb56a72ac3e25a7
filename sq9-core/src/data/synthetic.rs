//! Synthetic bars for offline development and tests.
//!
//! A deterministic random walk seeded from the symbol name. The series is
//! clearly fake and always tagged `DataSource::Synthetic`.

use super::provider::{BarRequest, DataError, DataProvider, DataSource, FetchResult, Interval};
use crate::domain::Bar;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Session hours used for intraday synthetic bars.
const SESSION_OPEN: (u32, u32) = (9, 15);
const SESSION_CLOSE: (u32, u32) = (15, 30);

/// Random-walk bars from 100.0 over weekdays in `[start, end]`.
///
/// Intraday intervals produce bars from 09:15 up to (not including) 15:30.
pub fn generate_synthetic_bars(symbol: &str, interval: Interval, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let step_volatility = if interval.is_intraday() { 0.004 } else { 0.02 };
    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut day = start;

    while day <= end {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day += Duration::days(1);
            continue;
        }

        for time in session_times(interval) {
            let ret: f64 = rng.gen_range(-step_volatility..step_volatility);
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..step_volatility / 2.0));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..step_volatility / 2.0));
            bars.push(Bar {
                timestamp: day.and_time(time),
                open,
                high,
                low,
                close,
                volume: rng.gen_range(10_000..1_000_000u64),
            });
            price = close;
        }
        day += Duration::days(1);
    }
    bars
}

fn session_times(interval: Interval) -> Vec<NaiveTime> {
    if !interval.is_intraday() {
        return vec![NaiveTime::MIN];
    }
    let step = interval.minutes() as u32;
    let open = SESSION_OPEN.0 * 60 + SESSION_OPEN.1;
    let close = SESSION_CLOSE.0 * 60 + SESSION_CLOSE.1;
    (open..close)
        .step_by(step as usize)
        .filter_map(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
        .collect()
}

/// Provider over [`generate_synthetic_bars`], with `Recent` windows anchored at `today`.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    today: NaiveDate,
}

impl SyntheticProvider {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbol: &str, request: &BarRequest) -> Result<FetchResult, DataError> {
        let (start, end) = request.window(self.today);
        let bars = generate_synthetic_bars(symbol, request.interval, start, end);
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Synthetic,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn deterministic_per_symbol() {
        let a = generate_synthetic_bars("SPY", Interval::Day1, d(2024, 1, 1), d(2024, 1, 31));
        let b = generate_synthetic_bars("SPY", Interval::Day1, d(2024, 1, 1), d(2024, 1, 31));
        let c = generate_synthetic_bars("QQQ", Interval::Day1, d(2024, 1, 1), d(2024, 1, 31));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn skips_weekends_and_is_sane() {
        // 2024-01-06/07 is a weekend
        let bars = generate_synthetic_bars("X", Interval::Day1, d(2024, 1, 5), d(2024, 1, 8));
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(Bar::is_sane));
    }

    #[test]
    fn intraday_session_grid() {
        let bars = generate_synthetic_bars("X", Interval::Minute15, d(2024, 1, 2), d(2024, 1, 2));
        // 09:15 .. 15:15 inclusive at 15-minute steps
        assert_eq!(bars.len(), 25);
        assert_eq!(bars[0].timestamp.time(), NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(bars[24].timestamp.time(), NaiveTime::from_hms_opt(15, 15, 0).unwrap());
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn provider_tags_source() {
        let provider = SyntheticProvider::new(d(2024, 1, 10));
        let result = provider
            .fetch("X", &BarRequest::recent(Interval::Day1, crate::data::Period::Day5))
            .unwrap();
        assert_eq!(result.source, DataSource::Synthetic);
        assert!(!result.bars.is_empty());
    }
}

//! Shared fixtures: a scripted in-memory provider and hand-built bar series.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sq9_core::data::{BarRequest, DataError, DataProvider, DataSource, FetchResult};
use sq9_core::{Bar, CostModel, Direction, SessionConfig, TradeMode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    // 2024-04-01 is a Monday.
    NaiveDate::from_ymd_opt(2024, 4, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub fn bar(ts: NaiveDateTime, o: f64, h: f64, l: f64, c: f64) -> Bar {
    Bar::new(ts, o, h, l, c)
}

pub fn frictionless(symbol: &str, direction: Direction, mode: TradeMode) -> SessionConfig {
    let mut cfg = SessionConfig::new(symbol, direction, mode);
    cfg.costs = CostModel::frictionless();
    cfg
}

/// Levels from 100: buy 101.67, sell 98.34, T1 102.23. One intraday long:
/// entry 600 @ 101.67, T1 takes 200, EOD closes 400 @ 102.00.
pub fn partial_then_eod_day() -> Vec<Bar> {
    vec![
        bar(at(1, 9, 15), 100.0, 100.5, 99.8, 100.2),
        bar(at(1, 9, 30), 100.2, 101.8, 100.1, 101.5),
        bar(at(1, 9, 45), 101.5, 102.5, 101.4, 102.3),
        bar(at(1, 10, 0), 102.3, 102.4, 101.9, 102.0),
    ]
}

/// Replays scripted responses in order, then keeps answering with `fallback`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Vec<Bar>, DataError>>>,
    fallback: Vec<Bar>,
    calls: AtomicUsize,
    available: AtomicBool,
}

impl ScriptedProvider {
    pub fn fixed(bars: Vec<Bar>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: bars,
            calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    pub fn scripted(responses: Vec<Result<Vec<Bar>, DataError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: Vec::new(),
            calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Simulates a closed request gate.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl DataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(&self, symbol: &str, _request: &BarRequest) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let bars = match next {
            Some(response) => response?,
            None => self.fallback.clone(),
        };
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Scripted,
        })
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

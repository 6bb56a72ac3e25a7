//! Live paper trading: poll a provider, step the simulation on each new bar.
//!
//! The session owns one [`Simulation`] and borrows a provider. Each poll
//! fetches the recent window, takes the newest bar and steps the simulation
//! only when that bar is newer than the last one processed. Transient data
//! failures keep the last known price and wait for the next poll.

use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sq9_core::data::{BarRequest, DataError, DataProvider, DataSource, Interval, Period};
use sq9_core::{Bar, BarContext, ExitReason, SessionConfig, Simulation, TradeEvent, TradeMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backtest::RunError;
use crate::report::{ReportWindow, SessionReport};

fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default()
}

fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default()
}

/// The `[paper]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub poll_interval_secs: u64,
    /// Floor on the poll interval, whatever `poll_interval_secs` says.
    pub min_poll_interval_secs: u64,
    /// Look-back of each poll's fetch.
    pub lookback: Period,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_polls: Option<u64>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            min_poll_interval_secs: 5,
            lookback: Period::Day1,
            start_time: default_start_time(),
            end_time: default_end_time(),
            start_date: None,
            end_date: None,
            max_polls: None,
        }
    }
}

impl PaperConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_interval: Duration::from_secs(self.min_poll_interval_secs),
            max_polls: self.max_polls,
        }
    }
}

/// When entries are allowed and when a day ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionWindow {
    /// Weekdays only, `[start_time, end_time)`.
    Intraday {
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
    /// Inclusive date range; open-ended sides are unbounded.
    Swing {
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    },
}

impl SessionWindow {
    pub fn for_mode(mode: TradeMode, paper: &PaperConfig) -> Self {
        match mode {
            TradeMode::Intraday => SessionWindow::Intraday {
                start_time: paper.start_time,
                end_time: paper.end_time,
            },
            TradeMode::Swing => SessionWindow::Swing {
                start_date: paper.start_date,
                end_date: paper.end_date,
            },
        }
    }

    /// Whether a bar starting at `t` may open a position.
    pub fn admits_entries(&self, t: NaiveDateTime) -> bool {
        match *self {
            SessionWindow::Intraday {
                start_time,
                end_time,
            } => is_weekday(t.date()) && t.time() >= start_time && t.time() < end_time,
            SessionWindow::Swing {
                start_date,
                end_date,
            } => {
                let day = t.date();
                start_date.map_or(true, |s| day >= s) && end_date.map_or(true, |e| day <= e)
            }
        }
    }

    /// Intraday: the bar ends at or after `end_time`. Swing never forces EOD.
    pub fn is_last_of_day(&self, t: NaiveDateTime, interval: Interval) -> bool {
        match *self {
            SessionWindow::Intraday { end_time, .. } => {
                let bar_end = t + ChronoDuration::minutes(interval.minutes());
                bar_end.date() > t.date() || bar_end.time() >= end_time
            }
            SessionWindow::Swing { .. } => false,
        }
    }

    /// A swing session past its end date has nothing left to do.
    pub fn is_over(&self, now: NaiveDateTime) -> bool {
        match *self {
            SessionWindow::Intraday { .. } => false,
            SessionWindow::Swing { end_date, .. } => end_date.map_or(false, |e| now.date() > e),
        }
    }
}

fn is_weekday(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Cloneable stop control for a running session.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    close: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Halt new entries and end the session at the next poll. Open positions stay open.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Like [`stop`](Self::stop), and close any open position at the last known price.
    pub fn stop_and_close(&self) {
        self.close.store(true, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn take_close_request(&self) -> bool {
        self.close.swap(false, Ordering::SeqCst)
    }
}

/// Longest single sleep between stop-flag checks while waiting for the next poll.
pub const STOP_CHECK_SLICE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub min_interval: Duration,
    pub max_polls: Option<u64>,
}

impl PollSettings {
    /// The interval actually slept between polls.
    pub fn effective_interval(&self) -> Duration {
        self.poll_interval.max(self.min_interval)
    }
}

/// Wall clock and sleep, injectable for tests.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

/// Exchange-local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A new bar was processed.
    Stepped(Vec<TradeEvent>),
    /// The newest bar was already processed.
    NoNewBar,
    /// The provider was unavailable or failed transiently; the last known price stands.
    Stale,
    /// A stop was requested. Carries any manual-close events.
    Stopped(Vec<TradeEvent>),
}

pub struct PaperSession<'a> {
    sim: Simulation,
    provider: &'a dyn DataProvider,
    request: BarRequest,
    window: SessionWindow,
    stop: StopHandle,
    bars: Vec<Bar>,
    events: Vec<TradeEvent>,
    source: DataSource,
    started_at: NaiveDateTime,
    polls: u64,
}

impl<'a> PaperSession<'a> {
    pub fn new(
        config: SessionConfig,
        paper: &PaperConfig,
        interval: Interval,
        provider: &'a dyn DataProvider,
        started_at: NaiveDateTime,
    ) -> Result<Self, RunError> {
        let sim = Simulation::new(config)?;
        let window = SessionWindow::for_mode(sim.config().trade_mode, paper);
        info!(
            symbol = %sim.config().symbol,
            provider = provider.name(),
            %interval,
            "paper session started"
        );
        Ok(Self {
            sim,
            provider,
            request: BarRequest::recent(interval, paper.lookback),
            window,
            stop: StopHandle::new(),
            bars: Vec::new(),
            events: Vec::new(),
            source: DataSource::YahooFinance,
            started_at,
            polls: 0,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn window(&self) -> SessionWindow {
        self.window
    }

    /// Every event emitted so far, in order.
    pub fn events(&self) -> &[TradeEvent] {
        &self.events
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Poll the provider once.
    ///
    /// Permanent provider errors (unknown symbol, malformed response) and
    /// simulation errors are returned; transient ones yield [`PollOutcome::Stale`].
    pub fn poll_once(&mut self, now: NaiveDateTime) -> Result<PollOutcome, RunError> {
        self.polls += 1;

        if self.stop.is_stopped() {
            self.sim.stop_entries();
            let events = if self.stop.take_close_request() {
                let events = self.sim.close_at_last(ExitReason::ManualClose);
                info!(closed = !events.is_empty(), "manual stop with close");
                events
            } else {
                info!("manual stop");
                Vec::new()
            };
            self.events.extend(events.iter().cloned());
            return Ok(PollOutcome::Stopped(events));
        }

        let symbol = self.sim.config().symbol.clone();
        if !self.provider.is_available() {
            warn!(
                %symbol,
                %now,
                provider = self.provider.name(),
                "provider unavailable, skipping fetch"
            );
            return Ok(PollOutcome::Stale);
        }
        let fetched = match self.provider.fetch(&symbol, &self.request) {
            Ok(f) => f,
            Err(e) if e.is_retryable() || matches!(e, DataError::NoData { .. }) => {
                warn!(
                    %symbol,
                    %now,
                    error = %e,
                    last_price = ?self.sim.last_price(),
                    "stale data, keeping last known price"
                );
                return Ok(PollOutcome::Stale);
            }
            Err(e) => return Err(e.into()),
        };
        self.source = fetched.source;

        let newest = match fetched.bars.iter().rev().find(|b| b.is_sane()) {
            Some(bar) => bar.clone(),
            None => {
                warn!(%symbol, %now, "poll returned no usable bar");
                return Ok(PollOutcome::Stale);
            }
        };
        if self.sim.last_time().map_or(false, |t| newest.timestamp <= t) {
            debug!(%symbol, bar = %newest.timestamp, "no new bar");
            return Ok(PollOutcome::NoNewBar);
        }

        let ctx = BarContext {
            is_last_of_day: self.window.is_last_of_day(newest.timestamp, self.request.interval),
            entries_allowed: self.window.admits_entries(newest.timestamp),
        };
        let events = self.sim.step(&newest, ctx)?;
        debug!(
            %symbol,
            bar = %newest.timestamp,
            close = newest.close,
            events = events.len(),
            "bar processed"
        );
        self.bars.push(newest);
        self.events.extend(events.iter().cloned());
        Ok(PollOutcome::Stepped(events))
    }

    /// Blocking poll loop.
    ///
    /// Ends on stop, on the circuit breaker, when a swing window has passed,
    /// after `max_polls`, or on a permanent error. Always produces a report;
    /// an open position stays open unless a close was requested.
    pub fn run(mut self, settings: PollSettings, clock: &dyn Clock) -> SessionReport {
        let interval = settings.effective_interval();
        loop {
            let now = clock.now();
            match self.poll_once(now) {
                Ok(PollOutcome::Stopped(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "paper session ended on error");
                    break;
                }
            }
            if self.sim.is_halted() {
                info!("circuit breaker tripped, paper session ending");
                break;
            }
            if settings.max_polls.map_or(false, |max| self.polls >= max) {
                info!(polls = self.polls, "max polls reached");
                break;
            }
            if self.window.is_over(now) {
                info!("session window has passed");
                break;
            }
            self.wait(interval, clock);
        }
        let ended_at = clock.now();
        self.into_report(ended_at)
    }

    /// Sleep up to `interval` in slices, returning early once a stop is requested.
    fn wait(&self, interval: Duration, clock: &dyn Clock) {
        let mut waited = Duration::ZERO;
        while waited < interval && !self.stop.is_stopped() {
            let slice = STOP_CHECK_SLICE.min(interval - waited);
            clock.sleep(slice);
            waited += slice;
        }
    }

    /// Finish without forcing a close.
    pub fn into_report(self, ended_at: NaiveDateTime) -> SessionReport {
        let window = ReportWindow::from_bars(&self.bars, self.request.interval, self.source);
        let result = self.sim.into_result();
        info!(
            trades = result.summary.total_trades,
            final_capital = result.summary.final_capital,
            open = result.open_position.is_some(),
            "paper session finished"
        );
        SessionReport::new(result, window, self.started_at, ended_at).with_benchmark(&self.bars)
    }
}

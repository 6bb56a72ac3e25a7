//! BDD tests for the live paper-trading session against a scripted provider.

mod common;

use chrono::{NaiveDateTime, NaiveTime};
use common::*;
use sq9_core::data::{DataError, Interval};
use sq9_core::{Direction, ExitReason, TradeEvent, TradeMode};
use sq9_runner::{
    Clock, PaperConfig, PaperSession, PollOutcome, PollSettings, StopHandle, STOP_CHECK_SLICE,
};
use std::sync::Mutex;
use std::time::Duration;

/// Clock whose sleeps advance time instantly.
struct ManualClock {
    now: Mutex<NaiveDateTime>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

/// Requests a stop and close on the first sleep, as a Ctrl-C handler would.
struct InterruptingClock {
    inner: ManualClock,
    handle: StopHandle,
}

impl Clock for InterruptingClock {
    fn now(&self) -> NaiveDateTime {
        self.inner.now()
    }

    fn sleep(&self, duration: Duration) {
        self.handle.stop_and_close();
        self.inner.sleep(duration);
    }
}

fn prefix(n: usize) -> Vec<sq9_core::Bar> {
    partial_then_eod_day().into_iter().take(n).collect()
}

#[test]
fn bdd_polls_step_only_on_new_bars_and_survive_stale_data() {
    // GIVEN a scripted feed: first bar, same bar again, an outage, then two more bars
    let provider = ScriptedProvider::scripted(vec![
        Ok(prefix(1)),
        Ok(prefix(1)),
        Err(DataError::DataUnavailable("timeout".into())),
        Ok(prefix(2)),
        Ok(prefix(3)),
    ]);
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let mut session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 9, 15),
    )
    .unwrap();

    // WHEN the first bar arrives THEN levels are adopted from its open
    let first = session.poll_once(at(1, 9, 16)).unwrap();
    match first {
        PollOutcome::Stepped(events) => assert!(matches!(
            events.first(),
            Some(TradeEvent::LevelsRecalculated { reference_price, .. }) if *reference_price == 100.0
        )),
        other => panic!("expected a step, got {other:?}"),
    }

    // WHEN the same bar is served again THEN nothing is processed
    assert_eq!(session.poll_once(at(1, 9, 17)).unwrap(), PollOutcome::NoNewBar);

    // WHEN the provider fails transiently THEN the last price stands
    assert_eq!(session.poll_once(at(1, 9, 18)).unwrap(), PollOutcome::Stale);
    assert_eq!(session.simulation().last_price(), Some(100.2));

    // WHEN the entry bar arrives THEN the long fills at the buy level
    let entry = session.poll_once(at(1, 9, 31)).unwrap();
    assert!(matches!(
        entry,
        PollOutcome::Stepped(ref events)
            if events.iter().any(|e| matches!(e, TradeEvent::Entered { price, quantity: 600, .. } if *price == 101.67))
    ));

    // WHEN T1 trades THEN a third of the position is taken off
    let t1 = session.poll_once(at(1, 9, 46)).unwrap();
    assert!(matches!(
        t1,
        PollOutcome::Stepped(ref events)
            if events.iter().any(|e| matches!(e, TradeEvent::PartialExit(p) if p.quantity == 200))
    ));
    assert_eq!(
        session
            .simulation()
            .state()
            .open_position
            .as_ref()
            .map(|p| p.remaining_quantity),
        Some(400)
    );
    assert_eq!(provider.calls(), 5);
}

#[test]
fn bdd_missed_end_of_day_closes_before_the_next_day_trades() {
    // GIVEN an entry on Monday, then an outage through Monday's last bar
    let provider = ScriptedProvider::scripted(vec![
        Ok(prefix(1)),
        Ok(prefix(2)),
        Err(DataError::DataUnavailable("timeout".into())),
        Ok(vec![bar(at(2, 9, 15), 102.5, 104.0, 102.4, 103.0)]),
    ]);
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let mut session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 9, 15),
    )
    .unwrap();
    session.poll_once(at(1, 9, 16)).unwrap();
    session.poll_once(at(1, 9, 31)).unwrap();
    assert_eq!(session.poll_once(at(1, 15, 31)).unwrap(), PollOutcome::Stale);

    // WHEN Tuesday's first bar arrives
    session.poll_once(at(2, 9, 16)).unwrap();

    // THEN Monday's position was closed at Monday's last seen close
    let report = session.into_report(at(2, 9, 16));
    assert!(report.open_position.is_none());
    assert_eq!(report.ledger.len(), 1);
    let trade = &report.ledger[0];
    assert_eq!(trade.quantity, 600);
    assert!(trade.partial_exits.is_empty());
    assert_eq!(trade.exit_time, at(1, 9, 30));
    assert_eq!(trade.exit_price, 101.5);
    assert_eq!(trade.reason, ExitReason::EndOfWindow);

    // AND Tuesday trades on levels from Tuesday's open
    let last_levels = report.level_history.last().unwrap();
    assert_eq!(last_levels.reference_price, 102.5);
    assert_eq!(last_levels.time, at(2, 9, 15));
}

#[test]
fn bdd_closed_gate_skips_the_fetch() {
    // GIVEN a session whose provider has tripped its request gate
    let provider = ScriptedProvider::fixed(prefix(1));
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let mut session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 9, 15),
    )
    .unwrap();
    provider.set_available(false);

    // WHEN it polls THEN nothing is fetched and the data counts as stale
    assert_eq!(session.poll_once(at(1, 9, 16)).unwrap(), PollOutcome::Stale);
    assert_eq!(provider.calls(), 0);

    // WHEN the gate reopens THEN polling resumes
    provider.set_available(true);
    assert!(matches!(
        session.poll_once(at(1, 9, 17)).unwrap(),
        PollOutcome::Stepped(_)
    ));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn bdd_stop_and_close_exits_at_last_known_price() {
    // GIVEN a session holding 400 shares after T1
    let provider = ScriptedProvider::scripted(vec![Ok(prefix(1)), Ok(prefix(2)), Ok(prefix(3))]);
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let mut session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 9, 15),
    )
    .unwrap();
    for minute in [16, 31, 46] {
        session.poll_once(at(1, 9, minute)).unwrap();
    }

    // WHEN the operator asks to stop and close
    session.stop_handle().stop_and_close();
    let outcome = session.poll_once(at(1, 9, 50)).unwrap();

    // THEN the remainder closes at the last close with a manual-close result
    let PollOutcome::Stopped(events) = outcome else {
        panic!("expected stop");
    };
    let closed = events.iter().find_map(|e| match e {
        TradeEvent::Closed(t) => Some(t.clone()),
        _ => None,
    });
    let trade = closed.expect("a closed trade");
    assert_eq!(trade.reason, ExitReason::ManualClose);
    assert_eq!(trade.result, "Manual Close");
    assert_eq!(trade.exit_price, 102.3);
    // 200 @ 102.23 + 400 @ 102.30 against 101.67
    assert!((trade.gross_pnl - 364.0).abs() < 1e-6);

    // AND the report has no open position
    let report = session.into_report(at(1, 9, 50));
    assert!(report.open_position.is_none());
    assert_eq!(report.ledger.len(), 1);
    assert!((report.summary.final_capital - 100_364.0).abs() < 1e-6);
    // No fetch happens on the stop poll.
    assert_eq!(provider.calls(), 3);
}

#[test]
fn bdd_plain_stop_leaves_position_open() {
    let provider = ScriptedProvider::scripted(vec![Ok(prefix(1)), Ok(prefix(2))]);
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let mut session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 9, 15),
    )
    .unwrap();
    session.poll_once(at(1, 9, 16)).unwrap();
    session.poll_once(at(1, 9, 31)).unwrap();

    session.stop_handle().stop();
    assert_eq!(
        session.poll_once(at(1, 9, 35)).unwrap(),
        PollOutcome::Stopped(Vec::new())
    );
    assert!(session.simulation().entries_stopped());

    let report = session.into_report(at(1, 9, 35));
    assert!(report.ledger.is_empty());
    assert_eq!(
        report.open_position.as_ref().map(|p| p.remaining_quantity),
        Some(600)
    );
}

#[test]
fn bdd_entries_blocked_outside_trading_window() {
    // GIVEN a window that opens at 10:00
    let paper = PaperConfig {
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        ..PaperConfig::default()
    };
    let provider = ScriptedProvider::scripted(vec![Ok(prefix(1)), Ok(prefix(2))]);
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let mut session =
        PaperSession::new(cfg, &paper, Interval::Minute15, &provider, at(1, 9, 15)).unwrap();

    // WHEN a 09:30 bar crosses the buy level
    session.poll_once(at(1, 9, 16)).unwrap();
    session.poll_once(at(1, 9, 31)).unwrap();

    // THEN no entry is taken, though levels were adopted
    assert!(session.simulation().levels().is_some());
    assert!(session.simulation().state().is_flat());
    assert!(!session
        .events()
        .iter()
        .any(|e| matches!(e, TradeEvent::Entered { .. })));
}

#[test]
fn bdd_run_loop_honours_max_polls_and_min_interval() {
    // GIVEN a provider that always serves the same day
    let provider = ScriptedProvider::fixed(partial_then_eod_day());
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 10, 1),
    )
    .unwrap();
    let clock = ManualClock::starting_at(at(1, 10, 1));
    let settings = PollSettings {
        poll_interval: Duration::from_secs(1),
        min_interval: Duration::from_secs(5),
        max_polls: Some(3),
    };

    // WHEN the blocking loop runs
    let report = session.run(settings, &clock);

    // THEN it polled three times, sleeping the floor interval in between
    assert_eq!(provider.calls(), 3);
    assert_eq!(clock.sleeps(), vec![STOP_CHECK_SLICE; 20]);
    // AND only the newest bar was processed, once
    assert_eq!(report.window.bars, 1);
    assert_eq!(report.window.last_bar, Some(at(1, 10, 0)));
    assert_eq!(report.started_at, at(1, 10, 1));
    assert_eq!(report.ended_at, at(1, 10, 1) + chrono::Duration::seconds(10));
}

#[test]
fn bdd_run_loop_ends_on_permanent_error_with_a_report() {
    let provider = ScriptedProvider::scripted(vec![
        Ok(prefix(1)),
        Err(DataError::SymbolNotFound {
            symbol: "TCS".into(),
        }),
    ]);
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 9, 15),
    )
    .unwrap();
    let clock = ManualClock::starting_at(at(1, 9, 16));
    let settings = PaperConfig::default().poll_settings();

    let report = session.run(settings, &clock);

    assert_eq!(provider.calls(), 2);
    assert_eq!(report.window.bars, 1);
    assert!(report.ledger.is_empty());
}

#[test]
fn bdd_stop_during_wait_ends_the_loop_without_waiting_out_the_interval() {
    // GIVEN a session polling once a minute
    let provider = ScriptedProvider::fixed(partial_then_eod_day());
    let cfg = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let session = PaperSession::new(
        cfg,
        &PaperConfig::default(),
        Interval::Minute15,
        &provider,
        at(1, 10, 1),
    )
    .unwrap();
    let clock = InterruptingClock {
        inner: ManualClock::starting_at(at(1, 10, 1)),
        handle: session.stop_handle(),
    };
    let settings = PaperConfig::default().poll_settings();

    // WHEN a stop arrives while waiting for the second poll
    let report = session.run(settings, &clock);

    // THEN the loop ends after one slice, without fetching again
    assert_eq!(provider.calls(), 1);
    assert_eq!(clock.inner.sleeps(), vec![STOP_CHECK_SLICE]);
    assert_eq!(report.window.bars, 1);
    assert!(report.open_position.is_none());
}

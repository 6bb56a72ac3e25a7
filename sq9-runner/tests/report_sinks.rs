//! Report sink tests: artifact directory, JSONL history, fire-and-forget publication.

mod common;

use anyhow::bail;
use common::*;
use sq9_core::data::{DataSource, Interval};
use sq9_core::{Direction, TradeMode};
use sq9_runner::{
    backtest_bars, publish_report, DirectorySink, HistorySink, ReportSink, SessionReport,
};

fn sample_report() -> SessionReport {
    let session = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    backtest_bars(
        session,
        &partial_then_eod_day(),
        Interval::Minute15,
        DataSource::Scripted,
    )
    .unwrap()
}

struct FailingSink;

impl ReportSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn publish(&self, _report: &SessionReport) -> anyhow::Result<()> {
        bail!("disk full")
    }
}

#[test]
fn directory_sink_writes_all_artifacts() {
    let temp = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(temp.path());
    let report = sample_report();

    let paths = sink.write(&report).unwrap();

    assert!(paths.dir.ends_with(&report.session_id));
    assert!(paths.report_json.exists());
    assert!(paths.trades_csv.exists());
    assert!(paths.partial_exits_csv.exists());
    assert!(paths.report_markdown.exists());

    // JSON round-trips
    let json = std::fs::read_to_string(&paths.report_json).unwrap();
    let back: SessionReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.session_id, report.session_id);
    assert_eq!(back.ledger.len(), report.ledger.len());
    assert_eq!(back.ledger[0].result, report.ledger[0].result);

    // trades.csv: header + one trade
    let trades = std::fs::read_to_string(&paths.trades_csv).unwrap();
    let lines: Vec<&str> = trades.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("trade_number,direction,entry_time"));
    assert!(lines[1].contains("EOD Exit"));
    assert!(lines[1].contains("Long"));

    // partial_exits.csv: header + the T1 leg
    let partials = std::fs::read_to_string(&paths.partial_exits_csv).unwrap();
    assert_eq!(partials.lines().count(), 2);
    assert!(partials.lines().nth(1).unwrap().starts_with("1,1,"));

    let md = std::fs::read_to_string(&paths.report_markdown).unwrap();
    assert!(md.contains("# Square-of-9 Session Report"));
    assert!(md.contains(&report.session_id));
    assert!(md.contains("## Benchmark (Buy & Hold)"));
    assert!(md.contains("## Trades"));
}

#[test]
fn directory_sink_writes_headers_for_empty_ledger() {
    let temp = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(temp.path());
    let session = frictionless("TCS", Direction::Long, TradeMode::Intraday);
    let bars = vec![bar(at(1, 9, 15), 100.0, 100.5, 99.5, 100.2)];
    let report = backtest_bars(session, &bars, Interval::Minute15, DataSource::Scripted).unwrap();

    let paths = sink.write(&report).unwrap();

    let trades = std::fs::read_to_string(&paths.trades_csv).unwrap();
    assert_eq!(trades.lines().count(), 1);
    let partials = std::fs::read_to_string(&paths.partial_exits_csv).unwrap();
    assert_eq!(partials.lines().count(), 1);
}

#[test]
fn history_sink_appends_one_line_per_session() {
    let temp = tempfile::tempdir().unwrap();
    let sink = HistorySink::new(temp.path().join("nested").join("history.jsonl"));
    let report = sample_report();

    sink.publish(&report).unwrap();
    sink.publish(&report).unwrap();

    let entries = sink.read_all().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].session_id, report.session_id);
    assert_eq!(entries[0].summary.total_trades, report.summary.total_trades);
    assert!((entries[0].summary.final_capital - report.summary.final_capital).abs() < 1e-6);
    assert!(!entries[0].halted);
    assert!(!entries[0].synthetic);
}

#[test]
fn history_skips_malformed_lines() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("history.jsonl");
    let sink = HistorySink::new(&path);
    sink.publish(&sample_report()).unwrap();
    std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"{not json}\n"))
        .unwrap();

    assert_eq!(sink.read_all().unwrap().len(), 1);
}

#[test]
fn publication_failures_are_not_propagated() {
    // GIVEN one failing sink between two working ones
    let temp = tempfile::tempdir().unwrap();
    let dir = DirectorySink::new(temp.path().join("reports"));
    let history = HistorySink::new(temp.path().join("history.jsonl"));
    let report = sample_report();

    // WHEN the report is published
    let sinks: [&dyn ReportSink; 3] = [&dir, &FailingSink, &history];
    let delivered = publish_report(&sinks, &report);

    // THEN the others still receive it
    assert_eq!(delivered, 2);
    assert!(temp
        .path()
        .join("reports")
        .join(&report.session_id)
        .join("report.json")
        .exists());
    assert_eq!(history.read_all().unwrap().len(), 1);
}

//! Markdown report generator.

use crate::report::SessionReport;

pub fn render_markdown(report: &SessionReport) -> String {
    let s = &report.summary;
    let m = &report.metrics;
    let cfg = &report.config;

    let mut out = format!(
        "# Square-of-9 Session Report\n\n\
Session: `{}`\n\n\
- Symbol: {}\n\
- Mode: {} / {}\n\
- Bars: {} ({})\n\n\
## Summary\n\
- Initial Capital: {:.2}\n\
- Final Capital: {:.2}\n\
- Total Return: {:+.2}%\n\
- Trades: {} ({} won, {} lost)\n\
- Win Rate: {:.1}%\n\
- Total Costs: {:.2} (brokerage {:.2})\n\
- Max Drawdown: {:.2}%\n\
- Max Consecutive Wins / Losses: {} / {}\n",
        report.session_id,
        report.symbol,
        cfg.trade_mode,
        cfg.direction,
        report.window.bars,
        report.window.interval,
        s.initial_capital,
        s.final_capital,
        s.total_return_pct,
        s.total_trades,
        s.winning_trades,
        s.losing_trades,
        s.win_rate,
        s.total_costs,
        s.total_brokerage,
        m.max_drawdown_pct,
        m.max_consecutive_wins,
        m.max_consecutive_losses,
    );

    if let Some(pf) = m.profit_factor {
        out.push_str(&format!("- Profit Factor: {pf:.2}\n"));
    }
    if report.is_synthetic() {
        out.push_str("\n> Synthetic data. Not a real market series.\n");
    }

    if let Some(trip) = &report.halted {
        out.push_str(&format!(
            "\n## Circuit Breaker\n\nTripped at {} with capital {:.2} (floor {:.2}).\n",
            trip.time, trip.capital, trip.floor
        ));
    }

    if let (Some(b), Some(c)) = (&report.benchmark, &report.comparison) {
        out.push_str(&format!(
            "\n## Benchmark (Buy & Hold)\n\n\
- Shares: {} @ {:.2} -> {:.2}\n\
- Net P&L: {:.2}\n\
- Return: {:+.2}%\n\
- Strategy vs Benchmark: {:+.2} pts ({})\n",
            b.shares,
            b.entry_price,
            b.exit_price,
            b.net_pnl,
            b.return_pct,
            c.return_difference,
            if c.outperformed { "outperformed" } else { "underperformed" },
        ));
    }

    if !report.ledger.is_empty() {
        out.push_str("\n## Trades\n\n");
        out.push_str("| # | Direction | Entry | Exit | Qty | Net P&L | Result |\n");
        out.push_str("|---|-----------|-------|------|-----|---------|--------|\n");
        for t in &report.ledger {
            out.push_str(&format!(
                "| {} | {} | {:.2} @ {} | {:.2} @ {} | {} | {:+.2} | {} |\n",
                t.trade_number,
                t.direction,
                t.entry_price,
                t.entry_time,
                t.exit_price,
                t.exit_time,
                t.quantity,
                t.net_pnl,
                t.result
            ));
        }
    }

    if let Some(pos) = &report.open_position {
        out.push_str(&format!(
            "\n## Open Position\n\n{} {} remaining of {} @ {:.2}, stop {:.2}\n",
            pos.direction, pos.remaining_quantity, pos.quantity, pos.entry_price, pos.stop_loss
        ));
    }

    out
}

//! sq9 CLI: level tables, backtests and live paper sessions.
//!
//! Commands:
//! - `levels`: print the Square-of-9 level table and trade plan for a price
//! - `backtest`: run a backtest from a TOML run file or flags, export artifacts
//! - `paper`: run the live paper-trading poll loop from a TOML run file

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use sq9_core::data::Interval;
use sq9_core::{Direction, LevelSet, SessionConfig, TradeMode};
use sq9_runner::{
    publish_report, run_backtest, run_batch, DirectorySink, HistorySink, PaperSession,
    ReportSink, RunConfig, SessionReport, SourceKind, StopHandle, SystemClock,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sq9", about = "Square-of-9 level trading simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Long,
    Short,
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Long => Direction::Long,
            DirectionArg::Short => Direction::Short,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Intraday,
    Swing,
}

impl From<ModeArg> for TradeMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Intraday => TradeMode::Intraday,
            ModeArg::Swing => TradeMode::Swing,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the level table, trade plan and risk/reward for a reference price.
    Levels {
        price: f64,

        #[arg(long, value_enum, default_value = "long")]
        direction: DirectionArg,

        #[arg(long, value_enum, default_value = "intraday")]
        mode: ModeArg,

        /// Print levels and plan as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a backtest from a TOML run file, or from flags.
    Backtest {
        /// Path to a TOML run file ([session], [data]).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbol(s). More than one runs a parallel batch.
        #[arg(long)]
        symbol: Vec<String>,

        #[arg(long, value_enum)]
        direction: Option<DirectionArg>,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Bar interval: 1m, 5m, 15m, 30m, 60m, 1d.
        #[arg(long)]
        interval: Option<String>,

        /// Read `<SYMBOL>.csv` files from this directory instead of Yahoo.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Use synthetic data (as fallback when another source is set).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "reports")]
        output_dir: PathBuf,
    },
    /// Run a live paper-trading session. Ctrl-C closes any open position and stops.
    Paper {
        /// Path to a TOML run file ([session], [data], [paper]).
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many polls.
        #[arg(long)]
        max_polls: Option<u64>,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "reports")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SQ9_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Levels {
            price,
            direction,
            mode,
            json,
        } => run_levels(price, direction.into(), mode.into(), json),
        Commands::Backtest {
            config,
            symbol,
            direction,
            mode,
            start,
            end,
            interval,
            csv_dir,
            synthetic,
            output_dir,
        } => {
            let overrides = BacktestOverrides {
                symbols: symbol,
                direction: direction.map(Into::into),
                mode: mode.map(Into::into),
                start,
                end,
                interval,
                csv_dir,
                synthetic,
            };
            run_backtest_cmd(config, overrides, &output_dir)
        }
        Commands::Paper {
            config,
            max_polls,
            output_dir,
        } => run_paper_cmd(&config, max_polls, &output_dir),
    }
}

fn run_levels(price: f64, direction: Direction, mode: TradeMode, json: bool) -> Result<()> {
    let levels = LevelSet::compute(price)?;
    let plan = levels.plan(mode, direction);

    if json {
        let out = serde_json::json!({
            "levels": levels,
            "plan": plan,
            "risk_reward": plan.risk_reward(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Square-of-9 levels for {:.2}", levels.reference_price);
    println!("  Buy above:   {:>10.2}", levels.buy);
    println!("  Sell below:  {:>10.2}", levels.sell);
    println!("  Breakout:    {:>10.2}", levels.breakout);
    println!();
    println!("  {:<4} {:>10} {:>10}", "", "Bull", "Bear");
    for (i, (bull, bear)) in levels
        .bull_targets
        .iter()
        .zip(levels.bear_targets.iter())
        .enumerate()
    {
        println!("  T{:<3} {:>10.2} {:>10.2}", i + 1, bull, bear);
    }
    println!();
    println!("  {:<4} {:>10} {:>10}", "", "Resist", "Support");
    for (i, (r, s)) in levels
        .resistances
        .iter()
        .zip(levels.supports.iter())
        .enumerate()
    {
        println!("  L{:<3} {:>10.2} {:>10.2}", i + 1, r, s);
    }

    println!();
    println!("{mode} {direction} plan");
    println!("  Entry:       {:>10.2}", plan.entry);
    println!("  Stop loss:   {:>10.2}", plan.stop_loss);
    for (i, (target, rr)) in plan.targets.iter().zip(plan.risk_reward()).enumerate() {
        println!("  Target {}:    {:>10.2}   R:R 1:{rr:.2}", i + 1, target);
    }
    Ok(())
}

struct BacktestOverrides {
    symbols: Vec<String>,
    direction: Option<Direction>,
    mode: Option<TradeMode>,
    start: Option<String>,
    end: Option<String>,
    interval: Option<String>,
    csv_dir: Option<PathBuf>,
    synthetic: bool,
}

impl BacktestOverrides {
    /// Flags win over file values.
    fn apply(&self, config: &mut RunConfig) -> Result<()> {
        if let Some(symbol) = self.symbols.first() {
            config.session.symbol = symbol.clone();
        }
        if let Some(direction) = self.direction {
            config.session.direction = direction;
        }
        if let Some(mode) = self.mode {
            config.session.trade_mode = mode;
        }
        if let Some(start) = &self.start {
            config.data.start = Some(parse_date(start)?);
        }
        if let Some(end) = &self.end {
            config.data.end = Some(parse_date(end)?);
        }
        if let Some(interval) = &self.interval {
            config.data.interval = Interval::parse(interval)
                .with_context(|| format!("unknown interval '{interval}'"))?;
        }
        if let Some(dir) = &self.csv_dir {
            config.data.source = SourceKind::Csv;
            config.data.csv_dir = Some(dir.clone());
        }
        if self.synthetic {
            if self.csv_dir.is_some() {
                config.data.synthetic_fallback = true;
            } else {
                config.data.source = SourceKind::Synthetic;
            }
        }
        Ok(())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    overrides: BacktestOverrides,
    output_dir: &Path,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => RunConfig::from_file(path)?,
        None => {
            if overrides.symbols.is_empty() {
                bail!("one of --config or --symbol is required");
            }
            let session = SessionConfig::new(
                overrides.symbols[0].clone(),
                Direction::Long,
                TradeMode::Intraday,
            );
            RunConfig::new(session)
        }
    };
    overrides.apply(&mut config)?;
    config.session.validate()?;

    let today = Local::now().date_naive();
    let provider = config.data.provider(today)?;
    let sinks = Sinks::new(output_dir);
    info!(
        symbols = overrides.symbols.len().max(1),
        source = ?config.data.source,
        interval = %config.data.interval,
        "backtest starting"
    );

    if overrides.symbols.len() > 1 {
        let results = run_batch(&config, &overrides.symbols, provider.as_ref(), today);
        let mut failed = 0;
        for result in results {
            match result.outcome {
                Ok(report) => {
                    print_summary(&report);
                    sinks.publish(&report);
                }
                Err(e) => {
                    eprintln!("Error for {}: {e}", result.symbol);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} symbols failed", overrides.symbols.len());
        }
        return Ok(());
    }

    let report = run_backtest(&config, provider.as_ref(), today)?;
    print_summary(&report);
    sinks.publish(&report);
    Ok(())
}

fn run_paper_cmd(config_path: &Path, max_polls: Option<u64>, output_dir: &Path) -> Result<()> {
    let config = RunConfig::from_file(config_path)?;
    let mut paper = config.paper.clone().unwrap_or_default();
    if max_polls.is_some() {
        paper.max_polls = max_polls;
    }

    let today = Local::now().date_naive();
    let provider = config.data.provider(today)?;
    let clock = SystemClock;
    let session = PaperSession::new(
        config.session.clone(),
        &paper,
        config.data.interval,
        provider.as_ref(),
        Local::now().naive_local(),
    )?;
    watch_ctrl_c(session.stop_handle())?;

    let report = session.run(paper.poll_settings(), &clock);
    print_summary(&report);
    Sinks::new(output_dir).publish(&report);
    Ok(())
}

/// Ctrl-C closes any open position at the last price and ends the session,
/// so the report is still published.
fn watch_ctrl_c(handle: StopHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    std::thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, closing position and stopping");
                handle.stop_and_close();
            }
        });
    });
    Ok(())
}

struct Sinks {
    directory: DirectorySink,
    history: HistorySink,
}

impl Sinks {
    fn new(output_dir: &Path) -> Self {
        Self {
            directory: DirectorySink::new(output_dir),
            history: HistorySink::new(output_dir.join("history.jsonl")),
        }
    }

    fn publish(&self, report: &SessionReport) {
        let sinks: [&dyn ReportSink; 2] = [&self.directory, &self.history];
        if publish_report(&sinks, report) == sinks.len() {
            println!(
                "Artifacts saved to: {}",
                self.directory.root().join(&report.session_id).display()
            );
        }
    }
}

fn print_summary(report: &SessionReport) {
    let s = &report.summary;
    let m = &report.metrics;
    println!();
    println!("=== {} ({} {}) ===", report.symbol, report.config.trade_mode, report.config.direction);
    if report.is_synthetic() {
        println!("  [synthetic data]");
    }
    println!("  Session:        {}", report.session_id);
    println!("  Bars:           {}", report.window.bars);
    println!("  Trades:         {} ({} won, {} lost)", s.total_trades, s.winning_trades, s.losing_trades);
    println!("  Win rate:       {:.1}%", s.win_rate);
    println!("  Initial:        {:.2}", s.initial_capital);
    println!("  Final:          {:.2}", s.final_capital);
    println!("  Return:         {:+.2}%", s.total_return_pct);
    println!("  Costs:          {:.2} (brokerage {:.2})", s.total_costs, s.total_brokerage);
    println!("  Max drawdown:   {:.2}%", m.max_drawdown_pct);
    if let Some(pf) = m.profit_factor {
        println!("  Profit factor:  {pf:.2}");
    }
    if let Some(trip) = &report.halted {
        println!(
            "  Circuit breaker tripped at {} (capital {:.2}, floor {:.2})",
            trip.time, trip.capital, trip.floor
        );
    }
    if let Some(pos) = &report.open_position {
        println!(
            "  Open position:  {} {} @ {:.2} (manual closure required)",
            pos.direction, pos.remaining_quantity, pos.entry_price
        );
    }
    if let (Some(b), Some(c)) = (&report.benchmark, &report.comparison) {
        println!();
        println!("  Buy & hold:     {} shares, {:+.2}% ({:+.2})", b.shares, b.return_pct, b.net_pnl);
        println!(
            "  vs benchmark:   {:+.2} pts, {}",
            c.return_difference,
            if c.outperformed { "outperformed" } else { "underperformed" }
        );
    }
}

mod data;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Bar, ExecutionAdapter, MarketEvent, RuntimeConfig, TradingConfig};
use engine::{
    BacktestReport, BinanceClient, KlineStream, LiveDriver, LogNotifier, SqliteTradeStore,
    TradeExecutor,
};
use paper::PaperBroker;

#[derive(Parser)]
#[command(name = "trendbot", about = "OHLCV signal engine: backtests and live trading")]
struct Cli {
    /// Path to the trading config TOML. Defaults are used when the file
    /// does not exist at the default path.
    #[arg(long, default_value = "config/trading.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay historical bars and print the trade ledger and summary.
    Backtest {
        /// CSV file of OHLCV bars; history is fetched from Binance when omitted.
        #[arg(long)]
        csv: Option<String>,
        /// History start date, YYYY-MM-DD (Binance fetch only).
        #[arg(long)]
        start: Option<String>,
        /// History end date, YYYY-MM-DD (Binance fetch only).
        #[arg(long)]
        end: Option<String>,
    },
    /// Trade live from the kline stream. Paper fills unless --real.
    Live {
        /// Route orders to the real exchange (requires API credentials).
        #[arg(long)]
        real: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_trading_config(&cli.config)?;
    info!(pair = %cfg.pair, interval = %cfg.interval, "trendbot starting");

    match cli.command {
        Command::Backtest { csv, start, end } => backtest(&cfg, csv, start, end).await,
        Command::Live { real } => live(cfg, real).await,
    }
}

fn load_trading_config(path: &str) -> anyhow::Result<TradingConfig> {
    if Path::new(path).exists() {
        Ok(TradingConfig::load(path)?)
    } else {
        info!(path, "no config file found — using defaults");
        let cfg = TradingConfig::default();
        cfg.validate()?;
        Ok(cfg)
    }
}

// ── backtest ─────────────────────────────────────────────────────────────

async fn backtest(
    cfg: &TradingConfig,
    csv: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> anyhow::Result<()> {
    let bars: Vec<Bar> = match csv {
        Some(path) => {
            info!(path, "loading bars from CSV");
            data::load_csv_bars(&path)?
        }
        None => {
            let start = parse_date(start.as_deref())?
                .unwrap_or_else(|| Utc::now() - Duration::days(365));
            let end = parse_date(end.as_deref())?;
            info!(pair = %cfg.pair, %start, "fetching history from Binance");
            BinanceClient::public()
                .fetch_history(&cfg.pair, &cfg.interval, start, end)
                .await?
        }
    };
    anyhow::ensure!(!bars.is_empty(), "no bars to replay");

    let report = engine::run(&bars, cfg)?;
    print_report(cfg, &bars, &report);
    Ok(())
}

fn parse_date(raw: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else { return Ok(None) };
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight timestamp")?;
    Ok(Some(Utc.from_utc_datetime(&midnight)))
}

fn print_report(cfg: &TradingConfig, bars: &[Bar], report: &BacktestReport) {
    let summary = &report.summary;

    println!("{}", "=".repeat(62));
    println!("TRENDBOT BACKTEST — {} {}", cfg.pair, cfg.interval);
    println!("{}", "=".repeat(62));
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        println!(
            "Period: {} to {}  ({} bars)",
            first.timestamp.format("%Y-%m-%d"),
            last.timestamp.format("%Y-%m-%d"),
            bars.len()
        );
    }
    println!("Signals: {}", report.signals.len());
    println!();
    println!("Total Trades:   {}", summary.total_trades);
    println!("Winning Trades: {}", summary.winning_trades);
    println!("Losing Trades:  {}", summary.losing_trades);
    println!("Win Rate:       {:.1}%", summary.win_rate);
    println!("Average Win:    {:+.2}%", summary.avg_win);
    println!("Average Loss:   {:+.2}%", summary.avg_loss);
    println!("Total P&L:      {:+.2}%  (${:+.2})", summary.total_pnl_pct, summary.total_pnl_abs);
    println!("Max Drawdown:   {:.2}%", summary.max_drawdown);
    println!("Profit Factor:  {:.2}", summary.profit_factor);

    if !report.trades.is_empty() {
        println!();
        println!("Last trades:");
        println!("{}", "-".repeat(62));
        for trade in report.trades.iter().rev().take(5).rev() {
            println!(
                "{} | {:5} | {:>9.2} -> {:>9.2} | {:+6.2}% | {:3} bars | {}",
                trade.entry_time.format("%Y-%m-%d %H:%M"),
                trade.direction.to_string(),
                trade.entry_price,
                trade.exit_price,
                trade.pnl_pct,
                trade.duration_bars,
                trade.exit_reason
            );
        }
    }
    println!("{}", "=".repeat(62));
}

// ── live ─────────────────────────────────────────────────────────────────

async fn live(cfg: TradingConfig, real: bool) -> anyhow::Result<()> {
    let runtime = RuntimeConfig::from_env();

    let (market_tx, _) = broadcast::channel::<MarketEvent>(1024);
    let (decision_tx, decision_rx) = mpsc::channel(128);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Seed the indicator window so signals are armed from the first live bar.
    let history = BinanceClient::public()
        .fetch_klines(&cfg.pair, &cfg.interval, cfg.live_window, None)
        .await
        .context("failed to fetch seed history")?;
    info!(bars = history.len(), "seed history loaded");

    let adapter: Arc<dyn ExecutionAdapter> = if real {
        let (key, secret) = runtime.credentials()?;
        info!("live order routing enabled — using BinanceClient");
        Arc::new(BinanceClient::new(key, secret))
    } else {
        info!(slippage_bps = runtime.paper_slippage_bps, "paper trading — using PaperBroker");
        let broker = Arc::new(PaperBroker::new(10_000.0, runtime.paper_slippage_bps));

        // Feed the broker the latest prices so fills stay realistic.
        let feed = broker.clone();
        let mut market_rx = market_tx.subscribe();
        tokio::spawn(async move {
            loop {
                match market_rx.recv().await {
                    Ok(event) => feed.update_price(&event.pair, event.close).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "paper price feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        broker
    };

    let store = Arc::new(
        SqliteTradeStore::connect(&runtime.database_url)
            .await
            .context("failed to open trade store")?,
    );
    let notifier = Arc::new(LogNotifier);

    let stream = KlineStream::new(cfg.pair.clone(), cfg.interval.clone(), market_tx.clone());
    let driver = LiveDriver::new(cfg, history, decision_tx);
    let executor = TradeExecutor::new(decision_rx, adapter, store, notifier);

    tokio::spawn(stream.run());
    tokio::spawn(executor.run());
    tokio::spawn(driver.run(market_tx.subscribe(), shutdown_rx));

    info!("all subsystems started — Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(true);
    info!("shutdown requested; stopping between bars");
    Ok(())
}

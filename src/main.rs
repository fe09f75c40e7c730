use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use decision_core::backtest::{
    run_batch, BacktestJob, BacktestResult, BacktestRunner, MarketScenario, SyntheticDataGenerator,
};
use decision_core::{AppConfig, Candle, RecommendationEngine, StrategyWeights};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Multi-strategy recommendation and backtest engine
#[derive(Parser, Debug)]
#[command(name = "decision-core")]
#[command(version)]
#[command(about = "Fuse technical strategies into recommendations and backtest them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding default.toml and environment overlays
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,
}

/// Where candles come from: a JSON file or a seeded synthetic scenario
#[derive(clap::Args, Debug)]
struct SeriesArgs {
    /// JSON array of candles
    #[arg(short, long, conflicts_with = "scenario")]
    input: Option<PathBuf>,

    /// Synthetic scenario: uptrend, downtrend, sideways, volatile, crash
    #[arg(short, long)]
    scenario: Option<String>,

    /// Seed for synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of synthetic candles
    #[arg(long, default_value = "500")]
    candles: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay the configured strategies over a series
    Backtest {
        #[command(flatten)]
        series: SeriesArgs,

        /// Print the full result as JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Recommendation for the latest candle of a series
    Recommend {
        /// JSON array of candles
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compare the configured weights with each strategy on its own
    Sweep {
        #[command(flatten)]
        series: SeriesArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("loading configuration from {}", cli.config_dir.display()))?;
    setup_logging(&config.logging.level);

    match cli.command {
        Commands::Backtest { series, json } => backtest(&config, &series, json),
        Commands::Recommend { input } => recommend(&config, &input),
        Commands::Sweep { series } => sweep(&config, &series).await,
    }
}

fn setup_logging(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_candles(path: &Path) -> anyhow::Result<Vec<Candle>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening candle file {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing candles from {}", path.display()))?;
    tracing::info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

fn load_series(args: &SeriesArgs) -> anyhow::Result<(String, Vec<Candle>)> {
    match (&args.input, &args.scenario) {
        (Some(path), _) => Ok((path.display().to_string(), read_candles(path)?)),
        (None, Some(name)) => {
            let scenario: MarketScenario = name.parse().map_err(anyhow::Error::msg)?;
            let candles = SyntheticDataGenerator::new(args.seed).generate(scenario, args.candles);
            Ok((format!("{} (seed {})", scenario.name(), args.seed), candles))
        }
        (None, None) => bail!("either --input or --scenario is required"),
    }
}

fn build_runner(config: &AppConfig, engine: RecommendationEngine) -> anyhow::Result<BacktestRunner> {
    Ok(BacktestRunner::new(
        Arc::new(engine),
        config.ledger.clone(),
        config.metrics.clone(),
        config.backtest.initial_capital,
    )?)
}

fn backtest(config: &AppConfig, series: &SeriesArgs, json: bool) -> anyhow::Result<()> {
    let (label, candles) = load_series(series)?;
    let runner = build_runner(config, RecommendationEngine::from_config(config)?)?;

    if json {
        let result = runner.run(&candles)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let result = runner.run_and_report(&candles, &label)?;
        print_trades(&result);
    }
    Ok(())
}

fn print_trades(result: &BacktestResult) {
    if result.trades.is_empty() {
        return;
    }
    println!("📋 TRADES");
    for trade in &result.trades {
        println!(
            "  #{:<3} {:<5} {} -> {}  ${:.4} -> ${:.4}  {:+.2} ({:+.2}%)  {:?}",
            trade.id,
            trade.side,
            trade.entry_timestamp.format("%Y-%m-%d %H:%M"),
            trade.exit_timestamp.format("%Y-%m-%d %H:%M"),
            trade.entry_price,
            trade.exit_price,
            trade.pnl,
            trade.pnl_percentage,
            trade.exit_reason
        );
    }
    println!();
}

fn recommend(config: &AppConfig, input: &Path) -> anyhow::Result<()> {
    let candles = read_candles(input)?;
    let engine = RecommendationEngine::from_config(config)?;
    let recommendation = engine.recommend(&candles)?;
    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}

async fn sweep(config: &AppConfig, series: &SeriesArgs) -> anyhow::Result<()> {
    let (label, candles) = load_series(series)?;
    let candles = Arc::new(candles);
    let base = RecommendationEngine::from_config(config)?;

    let mut weightings: Vec<(String, StrategyWeights)> =
        vec![("configured".to_string(), config.weights.clone())];
    for id in base.registry().ids() {
        let solo: StrategyWeights = base
            .registry()
            .ids()
            .into_iter()
            .map(|other| (other.to_string(), if other == id { 1.0 } else { 0.0 }))
            .collect();
        weightings.push((format!("{} only", id), solo));
    }

    let mut jobs = Vec::with_capacity(weightings.len());
    for (name, weights) in weightings {
        let runner = build_runner(config, base.with_weights(weights)?)?;
        jobs.push(BacktestJob::new(name, runner, candles.clone()));
    }

    let outcomes = run_batch(jobs).await;

    println!("\n🔬 Weight sweep: {} ({} candles)\n", label, candles.len());
    println!(
        "  {:<24} {:>7} {:>10} {:>8} {:>10} {:>9}",
        "weighting", "trades", "return %", "sharpe", "max dd %", "win %"
    );
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => {
                let m = &result.metrics;
                println!(
                    "  {:<24} {:>7} {:>+10.2} {:>8.2} {:>10.2} {:>9.1}",
                    outcome.name, m.total_trades, m.total_return, m.sharpe_ratio, m.max_drawdown, m.win_rate
                );
            }
            Err(e) => println!("  {:<24} failed: {}", outcome.name, e),
        }
    }
    println!();
    Ok(())
}

pub mod batch;
pub mod feed;
pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use batch::{run_batch, BacktestJob, BatchOutcome};
pub use feed::HistoryFeed;
pub use metrics::{BacktestMetrics, DurationUnit, MetricsConfig};
pub use runner::{run_backtest, BacktestConfig, BacktestResult, BacktestRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};

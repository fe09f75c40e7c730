// Core modules
pub mod aggregator;
pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod regime;
pub mod strategy;

// Re-export commonly used types
pub use aggregator::{AggregatorConfig, SignalAggregator, StopPolicy};
pub use backtest::{BacktestResult, BacktestRunner};
pub use config::AppConfig;
pub use engine::{EngineConfig, RecommendationEngine};
pub use error::{CoreError, LedgerError};
pub use execution::PositionLedger;
pub use models::*;
pub use strategy::{Strategy, StrategyRegistry};

// Error handling
pub type Result<T> = std::result::Result<T, CoreError>;

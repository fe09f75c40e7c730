use crate::aggregator::AggregatorConfig;
use crate::backtest::{BacktestConfig, MetricsConfig};
use crate::engine::EngineConfig;
use crate::error::CoreError;
use crate::execution::LedgerConfig;
use crate::models::StrategyWeights;
use crate::regime::RegimeConfig;
use crate::strategy::StrategiesConfig;
use crate::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an extra config file (e.g. `config/research.toml`)
pub const CONFIG_ENV_VAR: &str = "DECISION_CORE_ENV";
/// Prefix for overrides such as `DECISION_CORE__LEDGER__COMMISSION_RATE=0.002`
pub const ENV_PREFIX: &str = "DECISION_CORE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "decision_core=info".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub strategies: StrategiesConfig,
    pub weights: StrategyWeights,
    pub aggregator: AggregatorConfig,
    pub engine: EngineConfig,
    pub regime: RegimeConfig,
    pub ledger: LedgerConfig,
    pub backtest: BacktestConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Load configuration from `config/` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    ///
    /// Layers, later wins: built-in defaults, `default.toml`, the file named by
    /// `DECISION_CORE_ENV`, then `DECISION_CORE__<SECTION>__<KEY>` environment
    /// variables.
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("logging.level", LoggingConfig::default().level)?
            .add_source(File::from(config_dir.join("default.toml")).required(false));

        if let Ok(env_file) = std::env::var(CONFIG_ENV_VAR) {
            tracing::debug!("Layering config file {}", env_file);
            builder = builder.add_source(File::from(config_dir.join(env_file)).required(false));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject anything that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        self.strategies.validate()?;
        if let Some((strategy, weight)) = self.weights.first_invalid() {
            return Err(CoreError::invalid_config(format!(
                "weights.{} must be finite and non-negative, got {}",
                strategy, weight
            )));
        }
        self.aggregator.validate()?;
        self.engine.validate()?;
        self.regime.validate().map_err(CoreError::invalid_config)?;
        self.ledger.validate()?;
        self.backtest.validate()?;
        if let Some(factor) = self.metrics.annualization_factor {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(CoreError::invalid_config(
                    "metrics.annualization_factor must be positive",
                ));
            }
        }
        Ok(())
    }
}

use thiserror::Error;

/// Ledger invariant violations
///
/// These indicate a bug in whoever drives the ledger, never a market condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("no open position to close for {symbol}")]
    NoOpenPosition { symbol: String },

    #[error("already have an open {side} position for {symbol}")]
    PositionAlreadyOpen { symbol: String, side: String },

    #[error("ledger for {expected} received recommendation for {actual}")]
    SymbolMismatch { expected: String, actual: String },

    #[error("invalid position quantity {quantity}")]
    InvalidQuantity { quantity: f64 },
}

/// Top-level error type for the decision core
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("data integrity error at candle {index}: {reason}")]
    DataIntegrity { index: usize, reason: String },

    #[error("strategy {strategy} failed at candle {index}: {reason}")]
    Strategy {
        strategy: String,
        index: usize,
        reason: String,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("ledger error at candle {index}: {source}")]
    Ledger {
        index: usize,
        #[source]
        source: LedgerError,
    },

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("batch job {job} did not complete: {reason}")]
    Batch { job: usize, reason: String },
}

impl CoreError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn data_integrity(index: usize, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            index,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_component_and_index() {
        let err = CoreError::Strategy {
            strategy: "rsi_momentum".to_string(),
            index: 42,
            reason: "non-finite close".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rsi_momentum"));
        assert!(msg.contains("42"));

        let err = CoreError::Ledger {
            index: 7,
            source: LedgerError::NoOpenPosition {
                symbol: "SOL".to_string(),
            },
        };
        assert!(err.to_string().contains("no open position"));
    }
}

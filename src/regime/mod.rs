// Market-condition classification
pub mod conditions;

pub use conditions::{MarketConditionClassifier, RegimeConfig};

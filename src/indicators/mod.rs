// Technical indicators module
// Implements RSI, SMA/EMA, ATR, Bollinger bands and market-structure analysis

pub mod atr;
pub mod bollinger;
pub mod market_analysis;
pub mod moving_average;
pub mod rsi;

pub use atr::{calculate_atr, true_ranges};
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use market_analysis::{analyze_market_structure, calculate_volume_ratio, MarketStructure};
pub use moving_average::{calculate_ema, calculate_sma, calculate_stddev};
pub use rsi::calculate_rsi;

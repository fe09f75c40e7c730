use super::StrategyError;
use crate::error::CoreError;
use crate::models::Candle;

/// Validate a candle series before anything is evaluated
///
/// Rejects (never reorders):
/// - empty series
/// - mixed symbol or timeframe
/// - duplicate or decreasing open times
/// - non-finite or non-positive prices, negative volume, or high below low
pub fn validate_candle_series(candles: &[Candle]) -> Result<(), CoreError> {
    let first = candles
        .first()
        .ok_or_else(|| CoreError::data_integrity(0, "candle series is empty"))?;

    for (index, candle) in candles.iter().enumerate() {
        if candle.symbol != first.symbol || candle.timeframe != first.timeframe {
            return Err(CoreError::data_integrity(
                index,
                format!(
                    "series mixes {} {} with {} {}",
                    first.symbol, first.timeframe, candle.symbol, candle.timeframe
                ),
            ));
        }

        let values = [candle.open, candle.high, candle.low, candle.close, candle.volume];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(CoreError::data_integrity(
                index,
                "prices and volume must be finite and non-negative",
            ));
        }

        let prices = [candle.open, candle.high, candle.low, candle.close];
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(CoreError::data_integrity(
                index,
                format!(
                    "prices must be positive, got o={} h={} l={} c={}",
                    candle.open, candle.high, candle.low, candle.close
                ),
            ));
        }

        if candle.high < candle.low {
            return Err(CoreError::data_integrity(
                index,
                format!("high {} is below low {}", candle.high, candle.low),
            ));
        }
    }

    for (offset, window) in candles.windows(2).enumerate() {
        let (prev, next) = (&window[0], &window[1]);
        if next.open_time == prev.open_time {
            return Err(CoreError::data_integrity(
                offset + 1,
                format!("duplicate open time {}", next.open_time),
            ));
        }
        if next.open_time < prev.open_time {
            return Err(CoreError::data_integrity(
                offset + 1,
                format!(
                    "candles are not sorted by open time: {} after {}",
                    next.open_time, prev.open_time
                ),
            ));
        }
    }

    Ok(())
}

/// Closing prices of a window, failing on anything non-finite
pub fn extract_closes(window: &[Candle]) -> Result<Vec<f64>, StrategyError> {
    window
        .iter()
        .map(|c| {
            if c.close.is_finite() {
                Ok(c.close)
            } else {
                Err(StrategyError::new(format!(
                    "non-finite close at {}",
                    c.open_time
                )))
            }
        })
        .collect()
}

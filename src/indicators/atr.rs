/// Average True Range (ATR) indicator
///
/// Measures market volatility by calculating the average of true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Uses Wilder's smoothing for the moving average.
use crate::models::Candle;

/// True range of every candle after the first
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, current) = (&w[0], &w[1]);
            (current.high - current.low)
                .max((current.high - prev.close).abs())
                .max((current.low - prev.close).abs())
        })
        .collect()
}

/// Calculate ATR for the given candles
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let ranges = true_ranges(candles);

    // First ATR is simple average of first 'period' true ranges
    let mut atr = ranges.iter().take(period).sum::<f64>() / period as f64;

    for tr in &ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
    }

    Some(atr)
}

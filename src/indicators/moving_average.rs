/// Calculate Simple Moving Average (SMA) over the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
///
/// Seeded with the SMA of the first `period` values.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    let mut ema = calculate_sma(&prices[0..period], period)?;
    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
    }

    Some(ema)
}

/// Population standard deviation of the last `period` values
pub fn calculate_stddev(prices: &[f64], period: usize) -> Option<f64> {
    let mean = calculate_sma(prices, period)?;

    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| {
            let diff = p - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}

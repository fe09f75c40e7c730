/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Uses simple averages of the last `period` gains and losses.
/// A window with no movement at all reads as neutral (50).
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes = prices.windows(2).map(|w| w[1] - w[0]);
    let recent: Vec<f64> = changes.rev().take(period).collect();

    let avg_gain = recent.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let avg_loss = recent
        .iter()
        .filter(|c| **c < 0.0)
        .map(|c| c.abs())
        .sum::<f64>()
        / period as f64;

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return Some(50.0);
        }
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

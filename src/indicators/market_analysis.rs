/// Market structure and volume analysis
///
/// Provides functions to analyze price structure (higher highs/lows) and volume patterns
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarketStructure {
    HigherHighsHigherLows, // Uptrend
    LowerHighsLowerLows,   // Downtrend
    Mixed,                 // No clear structure
}

/// Analyze market structure over a lookback period
///
/// Returns the predominant market structure:
/// - HigherHighsHigherLows: most swings are higher highs + higher lows
/// - LowerHighsLowerLows: most swings are lower highs + lower lows
/// - Mixed: no clear structure
pub fn analyze_market_structure(candles: &[Candle], lookback: usize) -> MarketStructure {
    if candles.len() < lookback || lookback < 4 {
        return MarketStructure::Mixed;
    }

    let recent = &candles[candles.len() - lookback..];

    // Swing points are local peaks and troughs of the close
    let mut swing_highs = Vec::new();
    let mut swing_lows = Vec::new();
    for w in recent.windows(3) {
        let (prev, curr, next) = (w[0].close, w[1].close, w[2].close);
        if curr > prev && curr > next {
            swing_highs.push(curr);
        }
        if curr < prev && curr < next {
            swing_lows.push(curr);
        }
    }

    if swing_highs.len() < 2 || swing_lows.len() < 2 {
        return MarketStructure::Mixed;
    }

    let rising = |points: &[f64]| points.windows(2).filter(|w| w[1] > w[0]).count();
    let falling = |points: &[f64]| points.windows(2).filter(|w| w[1] <= w[0]).count();

    let uptrend_signals = rising(&swing_highs) + rising(&swing_lows);
    let downtrend_signals = falling(&swing_highs) + falling(&swing_lows);

    if uptrend_signals > downtrend_signals && uptrend_signals >= 3 {
        MarketStructure::HigherHighsHigherLows
    } else if downtrend_signals > uptrend_signals && downtrend_signals >= 3 {
        MarketStructure::LowerHighsLowerLows
    } else {
        MarketStructure::Mixed
    }
}

/// Current volume relative to the average of the previous `lookback` candles
///
/// None when there is not enough history or the reference volume is zero.
pub fn calculate_volume_ratio(candles: &[Candle], lookback: usize) -> Option<f64> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }

    let current = candles.last()?.volume;
    let reference = &candles[candles.len() - lookback - 1..candles.len() - 1];
    let avg_volume = reference.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;

    if avg_volume <= 0.0 {
        return None;
    }

    Some(current / avg_volume)
}

/// Market-condition classifier
///
/// Tags an evaluation window with three coarse labels:
/// - Trend: swing structure (higher highs/lows vs lower highs/lows), falling back
///   to close vs SMA when the structure is mixed
/// - Volatility: ATR as a percentage of the close
/// - Volume: latest volume against its recent average
///
/// Only candles inside the window are read, so the tags are as causal as the
/// signals they travel with.
use crate::indicators::{
    analyze_market_structure, calculate_atr, calculate_sma, calculate_volume_ratio,
    MarketStructure,
};
use crate::models::{Candle, MarketConditions, TrendClass, VolatilityClass, VolumeClass};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegimeConfig {
    pub structure_lookback: usize,
    pub trend_sma_period: usize,
    /// Distance from the SMA (percent) that counts as trending
    pub trend_band_pct: f64,
    pub atr_period: usize,
    pub low_volatility_pct: f64,
    pub high_volatility_pct: f64,
    pub volume_lookback: usize,
    pub low_volume_ratio: f64,
    pub high_volume_ratio: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            structure_lookback: 20,
            trend_sma_period: 20,
            trend_band_pct: 2.0,
            atr_period: 14,
            low_volatility_pct: 0.5,
            high_volatility_pct: 2.0,
            volume_lookback: 20,
            low_volume_ratio: 0.7,
            high_volume_ratio: 1.5,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.trend_sma_period == 0 || self.atr_period == 0 || self.volume_lookback == 0 {
            return Err("regime periods must be positive".to_string());
        }
        if !(self.low_volatility_pct >= 0.0 && self.high_volatility_pct > self.low_volatility_pct)
        {
            return Err("regime.high_volatility_pct must exceed low_volatility_pct".to_string());
        }
        if !(self.low_volume_ratio >= 0.0 && self.high_volume_ratio > self.low_volume_ratio) {
            return Err("regime.high_volume_ratio must exceed low_volume_ratio".to_string());
        }
        Ok(())
    }

    /// Candles needed before every tag can leave its neutral default
    pub fn min_window(&self) -> usize {
        self.structure_lookback
            .max(self.trend_sma_period)
            .max(self.atr_period + 1)
            .max(self.volume_lookback + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketConditionClassifier {
    config: RegimeConfig,
}

impl MarketConditionClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Classify the window ending at its last candle
    ///
    /// Any label that cannot be computed from the available history is
    /// reported as its neutral value.
    pub fn classify(&self, window: &[Candle]) -> MarketConditions {
        MarketConditions {
            trend: self.trend(window),
            volatility: self.volatility(window),
            volume: self.volume(window),
        }
    }

    fn trend(&self, window: &[Candle]) -> TrendClass {
        match analyze_market_structure(window, self.config.structure_lookback) {
            MarketStructure::HigherHighsHigherLows => return TrendClass::Uptrend,
            MarketStructure::LowerHighsLowerLows => return TrendClass::Downtrend,
            MarketStructure::Mixed => {}
        }

        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let (Some(sma), Some(close)) = (
            calculate_sma(&closes, self.config.trend_sma_period),
            closes.last().copied(),
        ) else {
            return TrendClass::Sideways;
        };
        if sma <= 0.0 {
            return TrendClass::Sideways;
        }

        let distance_pct = (close - sma) / sma * 100.0;
        if distance_pct > self.config.trend_band_pct {
            TrendClass::Uptrend
        } else if distance_pct < -self.config.trend_band_pct {
            TrendClass::Downtrend
        } else {
            TrendClass::Sideways
        }
    }

    fn volatility(&self, window: &[Candle]) -> VolatilityClass {
        let (Some(atr), Some(last)) = (calculate_atr(window, self.config.atr_period), window.last())
        else {
            return VolatilityClass::Normal;
        };
        if last.close <= 0.0 {
            return VolatilityClass::Normal;
        }

        let atr_pct = atr / last.close * 100.0;
        if atr_pct < self.config.low_volatility_pct {
            VolatilityClass::Low
        } else if atr_pct > self.config.high_volatility_pct {
            VolatilityClass::High
        } else {
            VolatilityClass::Normal
        }
    }

    fn volume(&self, window: &[Candle]) -> VolumeClass {
        match calculate_volume_ratio(window, self.config.volume_lookback) {
            Some(ratio) if ratio < self.config.low_volume_ratio => VolumeClass::Low,
            Some(ratio) if ratio > self.config.high_volume_ratio => VolumeClass::High,
            _ => VolumeClass::Normal,
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bar width of a candle series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
            Timeframe::W1 => 10080,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Bars per 365-day year (crypto markets trade around the clock)
    pub fn periods_per_year(&self) -> f64 {
        (365.0 * 24.0 * 60.0) / self.minutes() as f64
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        };
        f.write_str(label)
    }
}

/// OHLCV candlestick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Directional opinion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn is_directional(&self) -> bool {
        !matches!(self, Action::Hold)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("BUY"),
            Action::Sell => f.write_str("SELL"),
            Action::Hold => f.write_str("HOLD"),
        }
    }
}

/// Clamp a confidence into [0, 1]; NaN counts as no confidence
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One strategy's opinion for one evaluation point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub strategy: String,
    pub action: Action,
    pub confidence: f64,
    pub rationale: Option<String>,
    pub price_target: Option<f64>,
}

impl Signal {
    pub fn new(strategy: impl Into<String>, action: Action, confidence: f64) -> Self {
        Self {
            strategy: strategy.into(),
            action,
            confidence: clamp_confidence(confidence),
            rationale: None,
            price_target: None,
        }
    }

    /// HOLD with zero confidence, used when the window is too short
    pub fn insufficient_history(strategy: impl Into<String>, have: usize, need: usize) -> Self {
        Self::new(strategy, Action::Hold, 0.0)
            .with_rationale(format!("insufficient history: {} candles, need {}", have, need))
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_target(mut self, target: Option<f64>) -> Self {
        self.price_target = target.filter(|t| t.is_finite() && *t > 0.0);
        self
    }
}

/// Strategy id -> non-negative weight
///
/// Ordered so that every pass over the weights is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StrategyWeights(BTreeMap<String, f64>);

impl StrategyWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: impl Into<String>, weight: f64) -> Self {
        self.0.insert(strategy.into(), weight);
        self
    }

    pub fn insert(&mut self, strategy: impl Into<String>, weight: f64) {
        self.0.insert(strategy.into(), weight);
    }

    pub fn get(&self, strategy: &str) -> Option<f64> {
        self.0.get(strategy).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the first weight that is negative or not finite, if any
    pub fn first_invalid(&self) -> Option<(&str, f64)> {
        self.0
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
            .map(|(k, w)| (k.as_str(), *w))
    }
}

impl FromIterator<(String, f64)> for StrategyWeights {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Uptrend,
    Downtrend,
    Sideways,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityClass {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeClass {
    Low,
    Normal,
    High,
}

/// Market-condition tags attached to a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketConditions {
    pub trend: TrendClass,
    pub volatility: VolatilityClass,
    pub volume: VolumeClass,
}

impl Default for MarketConditions {
    fn default() -> Self {
        Self {
            trend: TrendClass::Sideways,
            volatility: VolatilityClass::Normal,
            volume: VolumeClass::Normal,
        }
    }
}

/// Fused, actionable output of the aggregator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub confidence: f64,
    pub close: f64,
    pub price_target: Option<f64>,
    pub stop_loss: Option<f64>,
    pub signals: Vec<Signal>,
    pub market_conditions: MarketConditions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("LONG"),
            Side::Short => f.write_str("SHORT"),
        }
    }
}

/// Exposure reported by the ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

/// Simulated open holding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    pub entry_commission: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Position {
    /// Gross P&L at `price`, before commissions
    pub fn gross_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity * self.side.sign()
    }

    /// P&L if the position were closed at `price`, both commissions included
    pub fn liquidation_pnl(&self, price: f64, commission_rate: f64) -> f64 {
        let exit_commission = price * self.quantity * commission_rate;
        self.gross_pnl(price) - self.entry_commission - exit_commission
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Opposite recommendation with no position opened on the other side
    Signal,
    /// Opposite recommendation that also opened the other side
    Reversal,
    StopLoss,
    TakeProfit,
    /// Still open when the series ended
    ForcedClose,
}

/// Closed round trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub pnl: f64,
    pub pnl_percentage: f64,
    pub is_profitable: bool,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn duration(&self) -> Duration {
        self.exit_timestamp - self.entry_timestamp
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

use crate::models::{Candle, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Large random swings
    Volatile,
    /// Slow grind up followed by a 25% collapse
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Crash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Crash => "crash",
        }
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s.to_lowercase())
            .ok_or_else(|| format!("unknown scenario '{}'", s))
    }
}

/// Fixed anchor for generated series so runs never depend on the wall clock
pub fn synthetic_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Generates seeded synthetic price data for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    symbol: String,
    timeframe: Timeframe,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: "SYNTH".to_string(),
            timeframe: Timeframe::H1,
            base_price: 150.0,
            base_volume: 1_000_000.0,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_candles` consecutive candles for a scenario
    pub fn generate(&mut self, scenario: MarketScenario, num_candles: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;

        for i in 0..num_candles {
            price = match scenario {
                MarketScenario::Uptrend => {
                    price * (1.0 + 0.003 + self.rng.gen_range(-0.004..0.004))
                }
                MarketScenario::Downtrend => {
                    price * (1.0 - 0.003 + self.rng.gen_range(-0.004..0.004))
                }
                MarketScenario::Sideways => {
                    // 10% pull back to the mean each bar
                    let reversion = (self.base_price - price) * 0.1;
                    price + reversion + price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => {
                    let moved = price * (1.0 + self.rng.gen_range(-0.05..0.05));
                    moved.max(self.base_price * 0.5)
                }
                MarketScenario::Crash => {
                    if i < num_candles / 2 {
                        price * (1.0 + self.rng.gen_range(-0.005..0.01))
                    } else {
                        let drop_rate = -0.25 / (num_candles as f64 / 2.0);
                        price * (1.0 + drop_rate + self.rng.gen_range(-0.005..0.005))
                    }
                }
            };

            let candle = self.create_candle(i, price);
            candles.push(candle);
        }

        candles
    }

    /// Build a candle with realistic intrabar range around `close`
    fn create_candle(&mut self, index: usize, close: f64) -> Candle {
        let noise_pct = 0.002;

        let high = close * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = close * (1.0 - self.rng.gen_range(0.0..noise_pct));
        let open = (close * (1.0 + self.rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Candle {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            open_time: synthetic_epoch() + self.timeframe.duration() * index as i32,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Candles whose open/high/low all equal the close
pub fn candles_from_closes(symbol: &str, timeframe: Timeframe, closes: &[f64]) -> Vec<Candle> {
    let bars: Vec<(f64, f64, f64, f64)> = closes.iter().map(|&c| (c, c, c, c)).collect();
    candles_from_ohlc(symbol, timeframe, &bars)
}

/// Candles from (open, high, low, close) tuples, one bar apart, volume 1000
pub fn candles_from_ohlc(
    symbol: &str,
    timeframe: Timeframe,
    bars: &[(f64, f64, f64, f64)],
) -> Vec<Candle> {
    bars.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            symbol: symbol.to_string(),
            timeframe,
            open_time: synthetic_epoch() + timeframe.duration() * i as i32,
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

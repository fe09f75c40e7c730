use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, LedgerError};
use crate::models::{
    Action, Candle, ExitReason, Position, PositionSide, Recommendation, Side, Trade,
};

/// How many units a new position buys or sells
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Same quantity every time
    FixedQuantity { quantity: f64 },
    /// Fraction of realized equity (initial capital + realized P&L)
    FixedFraction { fraction: f64 },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::FixedFraction { fraction: 0.95 }
    }
}

impl SizingPolicy {
    pub fn quantity_for(&self, price: f64, realized_equity: f64) -> f64 {
        match *self {
            SizingPolicy::FixedQuantity { quantity } => quantity,
            SizingPolicy::FixedFraction { fraction } => realized_equity * fraction / price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Commission per side as a fraction of notional (0.001 = 0.1%)
    pub commission_rate: f64,
    pub sizing: SizingPolicy,
    pub allow_short: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commission_rate: 0.001,
            sizing: SizingPolicy::default(),
            allow_short: false,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(CoreError::invalid_config(format!(
                "ledger.commission_rate must be in [0, 1), got {}",
                self.commission_rate
            )));
        }
        let sizing_ok = match self.sizing {
            SizingPolicy::FixedQuantity { quantity } => quantity.is_finite() && quantity > 0.0,
            SizingPolicy::FixedFraction { fraction } => fraction > 0.0 && fraction <= 1.0,
        };
        if !sizing_ok {
            return Err(CoreError::invalid_config(format!(
                "ledger.sizing is out of range: {:?}",
                self.sizing
            )));
        }
        Ok(())
    }
}

/// Exposure held by the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LedgerState {
    Flat,
    Long(Position),
    Short(Position),
}

impl LedgerState {
    fn holding(position: Position) -> Self {
        match position.side {
            Side::Long => LedgerState::Long(position),
            Side::Short => LedgerState::Short(position),
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            LedgerState::Flat => None,
            LedgerState::Long(p) | LedgerState::Short(p) => Some(p),
        }
    }

    pub fn side(&self) -> PositionSide {
        match self {
            LedgerState::Flat => PositionSide::Flat,
            LedgerState::Long(_) => PositionSide::Long,
            LedgerState::Short(_) => PositionSide::Short,
        }
    }
}

/// What a recommendation does to the current exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Open(Side),
    Close,
    Reverse(Side),
}

/// Ledger state machine
///
/// | state | BUY          | SELL                                  | HOLD |
/// |-------|--------------|---------------------------------------|------|
/// | Flat  | open long    | open short if allowed, else stay      | stay |
/// | Long  | stay         | reverse if shorts allowed, else close | stay |
/// | Short | reverse      | stay                                  | stay |
pub fn transition(current: PositionSide, action: Action, allow_short: bool) -> Transition {
    match (current, action) {
        (_, Action::Hold) => Transition::Stay,
        (PositionSide::Flat, Action::Buy) => Transition::Open(Side::Long),
        (PositionSide::Flat, Action::Sell) if allow_short => Transition::Open(Side::Short),
        (PositionSide::Flat, Action::Sell) => Transition::Stay,
        (PositionSide::Long, Action::Buy) | (PositionSide::Short, Action::Sell) => {
            Transition::Stay
        }
        (PositionSide::Long, Action::Sell) if allow_short => Transition::Reverse(Side::Short),
        (PositionSide::Long, Action::Sell) => Transition::Close,
        (PositionSide::Short, Action::Buy) => Transition::Reverse(Side::Long),
    }
}

/// Simulated position book for one symbol in one run
///
/// Owns at most one open position. Every closed round trip becomes a `Trade`
/// with a sequential id.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    symbol: String,
    config: LedgerConfig,
    initial_capital: f64,
    state: LedgerState,
    realized_pnl: f64,
    next_trade_id: u64,
}

impl PositionLedger {
    pub fn new(symbol: impl Into<String>, initial_capital: f64, config: LedgerConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            initial_capital,
            state: LedgerState::Flat,
            realized_pnl: 0.0,
            next_trade_id: 1,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn side(&self) -> PositionSide {
        self.state.side()
    }

    pub fn position(&self) -> Option<&Position> {
        self.state.position()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Initial capital plus realized P&L
    pub fn realized_equity(&self) -> f64 {
        self.initial_capital + self.realized_pnl
    }

    /// Liquidation-value P&L of the open position at `mark`, 0 when flat
    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.position()
            .map(|p| p.liquidation_pnl(mark, self.config.commission_rate))
            .unwrap_or(0.0)
    }

    /// Equity with the open position marked at `mark`
    pub fn equity(&self, mark: f64) -> f64 {
        self.realized_equity() + self.unrealized_pnl(mark)
    }

    /// Open a new position; the ledger must be flat
    pub fn open(
        &mut self,
        side: Side,
        price: f64,
        time: DateTime<Utc>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), LedgerError> {
        if let Some(existing) = self.state.position() {
            return Err(LedgerError::PositionAlreadyOpen {
                symbol: self.symbol.clone(),
                side: existing.side.to_string(),
            });
        }

        let quantity = self.config.sizing.quantity_for(price, self.realized_equity());
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }

        let entry_commission = price * quantity * self.config.commission_rate;
        tracing::info!(
            "Opened {} {} {:.6} @ ${:.4} (stop: {:?}, target: {:?})",
            side,
            self.symbol,
            quantity,
            price,
            stop_loss,
            take_profit
        );

        self.state = LedgerState::holding(Position {
            side,
            entry_price: price,
            entry_time: time,
            quantity,
            entry_commission,
            stop_loss,
            take_profit,
        });
        Ok(())
    }

    /// Close the open position and realize a trade
    pub fn close(
        &mut self,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Trade, LedgerError> {
        let position = match std::mem::replace(&mut self.state, LedgerState::Flat) {
            LedgerState::Flat => {
                return Err(LedgerError::NoOpenPosition {
                    symbol: self.symbol.clone(),
                })
            }
            LedgerState::Long(p) | LedgerState::Short(p) => p,
        };

        let exit_commission = price * position.quantity * self.config.commission_rate;
        let pnl = position.liquidation_pnl(price, self.config.commission_rate);
        let notional = position.entry_price * position.quantity;
        let pnl_percentage = if notional > 0.0 {
            pnl / notional * 100.0
        } else {
            0.0
        };

        let trade = Trade {
            id: self.next_trade_id,
            symbol: self.symbol.clone(),
            side: position.side,
            entry_timestamp: position.entry_time,
            exit_timestamp: time,
            entry_price: position.entry_price,
            exit_price: price,
            quantity: position.quantity,
            commission: position.entry_commission + exit_commission,
            pnl,
            pnl_percentage,
            is_profitable: pnl > 0.0,
            exit_reason: reason,
        };
        self.next_trade_id += 1;
        self.realized_pnl += pnl;

        tracing::info!(
            "Closed {} {} @ ${:.4}: P&L ${:.2} ({:+.2}%) [{:?}]",
            trade.side,
            self.symbol,
            price,
            pnl,
            pnl_percentage,
            reason
        );

        Ok(trade)
    }

    /// Stop/target check against a candle's range
    ///
    /// Runs before the candle's recommendation is applied. If both levels are
    /// inside the range the stop is taken. A candle that opens beyond a level
    /// fills at the open.
    pub fn check_exits(&mut self, candle: &Candle) -> Result<Option<Trade>, LedgerError> {
        let Some(position) = self.state.position() else {
            return Ok(None);
        };

        let exit = match position.side {
            Side::Long => {
                let stop = position
                    .stop_loss
                    .filter(|stop| candle.low <= *stop)
                    .map(|stop| (candle.open.min(stop), ExitReason::StopLoss));
                let target = position
                    .take_profit
                    .filter(|target| candle.high >= *target)
                    .map(|target| (candle.open.max(target), ExitReason::TakeProfit));
                stop.or(target)
            }
            Side::Short => {
                let stop = position
                    .stop_loss
                    .filter(|stop| candle.high >= *stop)
                    .map(|stop| (candle.open.max(stop), ExitReason::StopLoss));
                let target = position
                    .take_profit
                    .filter(|target| candle.low <= *target)
                    .map(|target| (candle.open.min(target), ExitReason::TakeProfit));
                stop.or(target)
            }
        };

        match exit {
            Some((price, reason)) => self.close(price, candle.open_time, reason).map(Some),
            None => Ok(None),
        }
    }

    /// Apply a recommendation at `candle`'s close
    pub fn on_recommendation(
        &mut self,
        recommendation: &Recommendation,
        candle: &Candle,
    ) -> Result<Vec<Trade>, LedgerError> {
        if recommendation.symbol != self.symbol {
            return Err(LedgerError::SymbolMismatch {
                expected: self.symbol.clone(),
                actual: recommendation.symbol.clone(),
            });
        }

        let price = candle.close;
        let time = candle.open_time;
        let stop = recommendation.stop_loss;
        let target = recommendation.price_target;

        match transition(self.side(), recommendation.action, self.config.allow_short) {
            Transition::Stay => Ok(Vec::new()),
            Transition::Open(side) => {
                self.open_if_funded(side, price, time, stop, target)?;
                Ok(Vec::new())
            }
            Transition::Close => Ok(vec![self.close(price, time, ExitReason::Signal)?]),
            Transition::Reverse(side) => {
                let trade = self.close(price, time, ExitReason::Reversal)?;
                self.open_if_funded(side, price, time, stop, target)?;
                Ok(vec![trade])
            }
        }
    }

    /// Open unless sizing yields no positive quantity (realized equity wiped out)
    fn open_if_funded(
        &mut self,
        side: Side,
        price: f64,
        time: DateTime<Utc>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), LedgerError> {
        let quantity = self.config.sizing.quantity_for(price, self.realized_equity());
        if !quantity.is_finite() || quantity <= 0.0 {
            tracing::warn!(
                "Skipping {} entry on {} @ ${:.4}: realized equity ${:.2} sizes to {}",
                side,
                self.symbol,
                price,
                self.realized_equity(),
                quantity
            );
            return Ok(());
        }
        self.open(side, price, time, stop_loss, take_profit)
    }

    /// Close whatever is still open at the end of a series
    pub fn force_close(&mut self, candle: &Candle) -> Result<Option<Trade>, LedgerError> {
        if self.side() == PositionSide::Flat {
            return Ok(None);
        }
        self.close(candle.close, candle.open_time, ExitReason::ForcedClose)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{candles_from_closes, candles_from_ohlc};
    use crate::models::{MarketConditions, Timeframe};
    use approx::assert_relative_eq;

    fn rec(candle: &Candle, action: Action, target: Option<f64>, stop: Option<f64>) -> Recommendation {
        Recommendation {
            symbol: candle.symbol.clone(),
            timeframe: candle.timeframe,
            timestamp: candle.open_time,
            action,
            confidence: 0.8,
            close: candle.close,
            price_target: target,
            stop_loss: stop,
            signals: Vec::new(),
            market_conditions: MarketConditions::default(),
        }
    }

    fn unit_config(allow_short: bool) -> LedgerConfig {
        LedgerConfig {
            commission_rate: 0.0,
            sizing: SizingPolicy::FixedQuantity { quantity: 1.0 },
            allow_short,
        }
    }

    #[test]
    fn test_transition_table() {
        use PositionSide::*;
        assert_eq!(transition(Flat, Action::Hold, true), Transition::Stay);
        assert_eq!(transition(Flat, Action::Buy, false), Transition::Open(Side::Long));
        assert_eq!(transition(Flat, Action::Sell, false), Transition::Stay);
        assert_eq!(transition(Flat, Action::Sell, true), Transition::Open(Side::Short));
        assert_eq!(transition(Long, Action::Buy, true), Transition::Stay);
        assert_eq!(transition(Long, Action::Sell, false), Transition::Close);
        assert_eq!(transition(Long, Action::Sell, true), Transition::Reverse(Side::Short));
        assert_eq!(transition(Short, Action::Buy, true), Transition::Reverse(Side::Long));
        assert_eq!(transition(Short, Action::Sell, true), Transition::Stay);
    }

    #[test]
    fn test_buy_then_sell_round_trip() {
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 105.0, 110.0]);
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(false));

        assert!(ledger
            .on_recommendation(&rec(&candles[0], Action::Buy, None, None), &candles[0])
            .unwrap()
            .is_empty());
        assert_eq!(ledger.side(), PositionSide::Long);

        ledger
            .on_recommendation(&rec(&candles[1], Action::Hold, None, None), &candles[1])
            .unwrap();

        let trades = ledger
            .on_recommendation(&rec(&candles[2], Action::Sell, None, None), &candles[2])
            .unwrap();
        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.exit_price, 110.0);
        assert_eq!(trade.pnl, 10.0);
        assert_eq!(trade.pnl_percentage, 10.0);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_eq!(ledger.side(), PositionSide::Flat);
        assert_eq!(ledger.realized_pnl(), 10.0);
    }

    #[test]
    fn test_reversal_opens_opposite_side() {
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 95.0]);
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(true));

        ledger
            .on_recommendation(&rec(&candles[0], Action::Buy, None, None), &candles[0])
            .unwrap();
        let trades = ledger
            .on_recommendation(&rec(&candles[1], Action::Sell, None, None), &candles[1])
            .unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::Reversal);
        assert_eq!(trades[0].pnl, -5.0);
        assert_eq!(ledger.side(), PositionSide::Short);
        assert_eq!(ledger.position().unwrap().entry_price, 95.0);
    }

    #[test]
    fn test_low_level_misuse_is_typed_error() {
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(false));
        let time = candles_from_closes("SOL", Timeframe::H1, &[1.0])[0].open_time;

        assert!(matches!(
            ledger.close(100.0, time, ExitReason::Signal),
            Err(LedgerError::NoOpenPosition { .. })
        ));

        ledger.open(Side::Long, 100.0, time, None, None).unwrap();
        assert!(matches!(
            ledger.open(Side::Long, 100.0, time, None, None),
            Err(LedgerError::PositionAlreadyOpen { .. })
        ));
    }

    #[test]
    fn test_symbol_mismatch_rejected() {
        let candles = candles_from_closes("JUP", Timeframe::H1, &[1.0]);
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(false));
        assert!(matches!(
            ledger.on_recommendation(&rec(&candles[0], Action::Buy, None, None), &candles[0]),
            Err(LedgerError::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn test_stop_wins_when_both_levels_hit() {
        let candles = candles_from_ohlc(
            "SOL",
            Timeframe::H1,
            &[(100.0, 100.0, 100.0, 100.0), (100.0, 112.0, 94.0, 101.0)],
        );
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(false));
        ledger
            .on_recommendation(
                &rec(&candles[0], Action::Buy, Some(110.0), Some(95.0)),
                &candles[0],
            )
            .unwrap();

        let trade = ledger.check_exits(&candles[1]).unwrap().unwrap();
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 95.0);
    }

    #[test]
    fn test_gap_through_stop_fills_at_open() {
        let candles = candles_from_ohlc(
            "SOL",
            Timeframe::H1,
            &[(100.0, 100.0, 100.0, 100.0), (90.0, 91.0, 88.0, 89.0)],
        );
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(false));
        ledger
            .on_recommendation(&rec(&candles[0], Action::Buy, Some(110.0), Some(95.0)), &candles[0])
            .unwrap();

        let trade = ledger.check_exits(&candles[1]).unwrap().unwrap();
        assert_eq!(trade.exit_price, 90.0);
    }

    #[test]
    fn test_short_take_profit() {
        let candles = candles_from_ohlc(
            "SOL",
            Timeframe::H1,
            &[(100.0, 100.0, 100.0, 100.0), (99.0, 99.5, 91.0, 92.0)],
        );
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(true));
        ledger
            .on_recommendation(&rec(&candles[0], Action::Sell, Some(93.0), Some(104.0)), &candles[0])
            .unwrap();

        let trade = ledger.check_exits(&candles[1]).unwrap().unwrap();
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_eq!(trade.exit_price, 93.0);
        assert_eq!(trade.pnl, 7.0);
    }

    #[test]
    fn test_commission_and_equity_reconcile() {
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 120.0]);
        let config = LedgerConfig {
            commission_rate: 0.001,
            sizing: SizingPolicy::FixedFraction { fraction: 0.5 },
            allow_short: false,
        };
        let mut ledger = PositionLedger::new("SOL", 10_000.0, config);
        ledger
            .on_recommendation(&rec(&candles[0], Action::Buy, None, None), &candles[0])
            .unwrap();
        assert_relative_eq!(ledger.position().unwrap().quantity, 50.0);

        let marked = ledger.equity(120.0);
        let trade = ledger.force_close(&candles[1]).unwrap().unwrap();

        // 50 × 20 gross, 5 entry + 6 exit commission
        assert_relative_eq!(trade.pnl, 989.0, epsilon = 1e-9);
        assert_relative_eq!(trade.commission, 11.0, epsilon = 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::ForcedClose);
        assert_relative_eq!(marked, ledger.equity(120.0), epsilon = 1e-9);
        assert_relative_eq!(ledger.realized_equity(), 10_989.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wiped_out_equity_skips_reversal_entry() {
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 180.0, 250.0]);
        let config = LedgerConfig {
            commission_rate: 0.001,
            sizing: SizingPolicy::FixedFraction { fraction: 0.95 },
            allow_short: true,
        };
        let mut ledger = PositionLedger::new("SOL", 10_000.0, config);
        ledger
            .on_recommendation(&rec(&candles[0], Action::Sell, None, None), &candles[0])
            .unwrap();
        assert_eq!(ledger.side(), PositionSide::Short);

        let trades = ledger
            .on_recommendation(&rec(&candles[2], Action::Buy, None, None), &candles[2])
            .unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::Reversal);
        assert!(ledger.realized_equity() < 0.0);
        assert_eq!(ledger.side(), PositionSide::Flat);

        // Later entries are skipped too rather than failing
        assert!(ledger
            .on_recommendation(&rec(&candles[2], Action::Sell, None, None), &candles[2])
            .unwrap()
            .is_empty());
        assert_eq!(ledger.side(), PositionSide::Flat);
    }

    #[test]
    fn test_trade_quantity_matches_closed_position() {
        let candles = candles_from_ohlc(
            "SOL",
            Timeframe::H1,
            &[
                (100.0, 100.0, 100.0, 100.0),
                (100.0, 101.0, 85.0, 95.0),
                (95.0, 95.0, 95.0, 95.0),
                (90.0, 90.0, 90.0, 90.0),
                (92.0, 92.0, 92.0, 92.0),
            ],
        );
        let config = LedgerConfig {
            commission_rate: 0.001,
            sizing: SizingPolicy::FixedFraction { fraction: 0.5 },
            allow_short: true,
        };
        let mut ledger = PositionLedger::new("SOL", 10_000.0, config.clone());
        let held = |ledger: &PositionLedger| ledger.position().unwrap().quantity;

        ledger
            .on_recommendation(&rec(&candles[0], Action::Buy, Some(120.0), Some(90.0)), &candles[0])
            .unwrap();
        let quantity = held(&ledger);
        let stopped = ledger.check_exits(&candles[1]).unwrap().unwrap();
        assert_eq!(stopped.exit_reason, ExitReason::StopLoss);
        assert_eq!(stopped.quantity, quantity);

        ledger
            .on_recommendation(&rec(&candles[2], Action::Sell, None, None), &candles[2])
            .unwrap();
        let quantity = held(&ledger);
        let reversed = ledger
            .on_recommendation(&rec(&candles[3], Action::Buy, None, None), &candles[3])
            .unwrap();
        assert_eq!(reversed[0].exit_reason, ExitReason::Reversal);
        assert_eq!(reversed[0].quantity, quantity);

        let quantity = held(&ledger);
        let forced = ledger.force_close(&candles[4]).unwrap().unwrap();
        assert_eq!(forced.exit_reason, ExitReason::ForcedClose);
        assert_eq!(forced.quantity, quantity);

        let mut ledger = PositionLedger::new(
            "SOL",
            10_000.0,
            LedgerConfig {
                allow_short: false,
                ..config
            },
        );
        ledger
            .on_recommendation(&rec(&candles[0], Action::Buy, None, None), &candles[0])
            .unwrap();
        let quantity = held(&ledger);
        let closed = ledger
            .on_recommendation(&rec(&candles[2], Action::Sell, None, None), &candles[2])
            .unwrap();
        assert_eq!(closed[0].exit_reason, ExitReason::Signal);
        assert_eq!(closed[0].quantity, quantity);
    }

    #[test]
    fn test_trade_ids_are_sequential() {
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 101.0, 102.0, 103.0]);
        let mut ledger = PositionLedger::new("SOL", 10_000.0, unit_config(false));
        let mut ids = Vec::new();
        for pair in candles.chunks(2) {
            ledger
                .on_recommendation(&rec(&pair[0], Action::Buy, None, None), &pair[0])
                .unwrap();
            let trades = ledger
                .on_recommendation(&rec(&pair[1], Action::Sell, None, None), &pair[1])
                .unwrap();
            ids.extend(trades.iter().map(|t| t.id));
        }
        assert_eq!(ids, vec![1, 2]);
    }
}

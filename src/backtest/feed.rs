use crate::models::Candle;

/// Causal view over a candle series
///
/// Reveals one candle per step. The history handed out at step `i` is exactly
/// `series[..=i]`, so nothing later than the current candle is reachable.
#[derive(Debug, Clone)]
pub struct HistoryFeed<'a> {
    series: &'a [Candle],
    revealed: usize,
}

impl<'a> HistoryFeed<'a> {
    pub fn new(series: &'a [Candle]) -> Self {
        Self {
            series,
            revealed: 0,
        }
    }

    /// Candles revealed so far, oldest first
    pub fn history(&self) -> &'a [Candle] {
        &self.series[..self.revealed]
    }

    pub fn remaining(&self) -> usize {
        self.series.len() - self.revealed
    }
}

impl<'a> Iterator for HistoryFeed<'a> {
    /// (index of the new candle, history up to and including it)
    type Item = (usize, &'a [Candle]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.revealed >= self.series.len() {
            return None;
        }
        self.revealed += 1;
        Some((self.revealed - 1, self.history()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

/// Bollinger Bands
///
/// - Middle: SMA over `period` closes
/// - Upper: Middle + (multiplier × StdDev)
/// - Lower: Middle - (multiplier × StdDev)
///
/// StdDev is the population standard deviation (divides by N).
use super::moving_average::{calculate_sma, calculate_stddev};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// %b: 0 at the lower band, 1 at the upper band. None when the bands collapse.
    pub fn percent_b(&self, price: f64) -> Option<f64> {
        let width = self.width();
        if width <= f64::EPSILON {
            return None;
        }
        Some((price - self.lower) / width)
    }
}

pub fn calculate_bollinger(prices: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(prices, period)?;
    let stddev = calculate_stddev(prices, period)?;

    Some(BollingerBands {
        upper: middle + multiplier * stddev,
        middle,
        lower: middle - multiplier * stddev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_symmetric_around_sma() {
        let prices = vec![2.0, 4.0, 6.0, 8.0];
        let bands = calculate_bollinger(&prices, 4, 2.0).unwrap();
        assert_eq!(bands.middle, 5.0);
        assert!((bands.upper - bands.middle - (bands.middle - bands.lower)).abs() < 1e-12);
        assert!((bands.upper - (5.0 + 2.0 * 5.0_f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_percent_b() {
        let bands = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert_eq!(bands.percent_b(90.0), Some(0.0));
        assert_eq!(bands.percent_b(100.0), Some(0.5));
        assert_eq!(bands.percent_b(115.0), Some(1.25));
    }

    #[test]
    fn test_flat_prices_collapse_bands() {
        let bands = calculate_bollinger(&[100.0; 20], 20, 2.0).unwrap();
        assert_eq!(bands.width(), 0.0);
        assert!(bands.percent_b(100.0).is_none());
    }

    #[test]
    fn test_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0], 20, 2.0).is_none());
    }
}

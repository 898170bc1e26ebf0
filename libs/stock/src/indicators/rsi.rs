use anyhow::{Result, ensure};
use ta::Next;

/// Relative Strength Index with Wilder smoothing.
///
/// Gains and losses are averaged with `alpha = 1 / period` and no bias
/// correction; the first delta seeds both averages.
#[derive(Debug, Clone)]
pub struct WilderRsi {
    period: usize,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    deltas: usize,
}

impl WilderRsi {
    pub fn new(period: usize) -> Result<Self> {
        ensure!(period > 0, "rsi period must be positive");
        Ok(Self {
            period,
            prev_close: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            deltas: 0,
        })
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            // no losses in the window: saturate, or sit at midline if flat
            return if self.avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Next<f64> for WilderRsi {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;

        let delta = close - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        if self.deltas == 0 {
            self.avg_gain = gain;
            self.avg_loss = loss;
        } else {
            let alpha = 1.0 / self.period as f64;
            self.avg_gain += alpha * (gain - self.avg_gain);
            self.avg_loss += alpha * (loss - self.avg_loss);
        }
        self.deltas += 1;

        if self.deltas + 1 < self.period {
            return None;
        }
        Some(self.value())
    }
}

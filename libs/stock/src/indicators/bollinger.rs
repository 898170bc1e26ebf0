use std::collections::VecDeque;

use anyhow::{Result, anyhow, ensure};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: f64,
    pub average: f64,
    pub lower: f64,
}

/// Bollinger Bands using the sample (n - 1) standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    multiplier: f64,
    sma: SimpleMovingAverage,
    window: VecDeque<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, multiplier: f64) -> Result<Self> {
        ensure!(period >= 2, "bollinger period must be at least 2");
        ensure!(multiplier > 0.0, "bollinger multiplier must be positive");
        let sma = SimpleMovingAverage::new(period).map_err(|e| anyhow!("sma({period}): {e:?}"))?;
        Ok(Self {
            period,
            multiplier,
            sma,
            window: VecDeque::with_capacity(period),
        })
    }
}

impl Next<f64> for BollingerBands {
    type Output = Option<BollingerOutput>;

    fn next(&mut self, close: f64) -> Option<BollingerOutput> {
        let average = self.sma.next(close);

        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);

        if self.window.len() < self.period {
            return None;
        }

        let variance = self
            .window
            .iter()
            .map(|x| (x - average).powi(2))
            .sum::<f64>()
            / (self.period - 1) as f64;
        let width = self.multiplier * variance.sqrt();

        Some(BollingerOutput {
            upper: average + width,
            average,
            lower: average - width,
        })
    }
}

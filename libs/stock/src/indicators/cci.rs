use std::collections::VecDeque;

use anyhow::{Result, anyhow, ensure};
use ta::indicators::SimpleMovingAverage;
use ta::{Close, High, Low, Next};

const LAMBERT: f64 = 0.015;

/// Commodity Channel Index over the typical price `(high + low + close) / 3`.
#[derive(Debug, Clone)]
pub struct CommodityChannelIndex {
    period: usize,
    sma: SimpleMovingAverage,
    window: VecDeque<f64>,
}

impl CommodityChannelIndex {
    pub fn new(period: usize) -> Result<Self> {
        ensure!(period > 0, "cci period must be positive");
        let sma = SimpleMovingAverage::new(period).map_err(|e| anyhow!("sma({period}): {e:?}"))?;
        Ok(Self {
            period,
            sma,
            window: VecDeque::with_capacity(period),
        })
    }
}

impl<T: High + Low + Close> Next<&T> for CommodityChannelIndex {
    type Output = Option<f64>;

    fn next(&mut self, item: &T) -> Option<f64> {
        let typical = (item.high() + item.low() + item.close()) / 3.0;
        let mean = self.sma.next(typical);

        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(typical);

        if self.window.len() < self.period {
            return None;
        }

        let mad = self.window.iter().map(|x| (x - mean).abs()).sum::<f64>() / self.period as f64;
        if mad == 0.0 {
            return Some(0.0);
        }
        Some((typical - mean) / (LAMBERT * mad))
    }
}

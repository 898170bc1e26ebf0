mod bollinger;
mod cci;
mod rsi;

pub use bollinger::{BollingerBands, BollingerOutput};
pub use cci::CommodityChannelIndex;
pub use rsi::WilderRsi;

use anyhow::Result;
use ta::Next;

use crate::series::PriceRow;

pub const RSI_PERIOD: usize = 14;
pub const CCI_PERIOD: usize = 5;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_MULTIPLIER: f64 = 2.0;

/// Indicators are only attached to tables with at least this many rows.
pub const MIN_ROWS: usize = BOLLINGER_PERIOD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorColumn {
    Rsi,
    Cci,
    BollingerTop,
    BollingerMid,
    BollingerBottom,
}

impl IndicatorColumn {
    pub const ALL: [IndicatorColumn; 5] = [
        IndicatorColumn::Rsi,
        IndicatorColumn::Cci,
        IndicatorColumn::BollingerTop,
        IndicatorColumn::BollingerMid,
        IndicatorColumn::BollingerBottom,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            IndicatorColumn::Rsi => "RSI",
            IndicatorColumn::Cci => "CCI",
            IndicatorColumn::BollingerTop => "Bollinger Top",
            IndicatorColumn::BollingerMid => "Bollinger Mid",
            IndicatorColumn::BollingerBottom => "Bollinger Bottom",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == header.trim())
    }
}

pub type Column = (IndicatorColumn, Vec<Option<f64>>);

/// Run every indicator over `rows`, oldest first.
///
/// Each column has one entry per row; warm-up rows are `None`.
pub fn calculate(rows: &[PriceRow]) -> Result<Vec<Column>> {
    let mut rsi = WilderRsi::new(RSI_PERIOD)?;
    let mut cci = CommodityChannelIndex::new(CCI_PERIOD)?;
    let mut bb = BollingerBands::new(BOLLINGER_PERIOD, BOLLINGER_MULTIPLIER)?;

    let n = rows.len();
    let mut rsi_vals = Vec::with_capacity(n);
    let mut cci_vals = Vec::with_capacity(n);
    let mut top = Vec::with_capacity(n);
    let mut mid = Vec::with_capacity(n);
    let mut bottom = Vec::with_capacity(n);

    for row in rows {
        rsi_vals.push(rsi.next(row.close));
        cci_vals.push(cci.next(row));

        let band = bb.next(row.close);
        top.push(band.map(|b| b.upper));
        mid.push(band.map(|b| b.average));
        bottom.push(band.map(|b| b.lower));
    }

    Ok(vec![
        (IndicatorColumn::Rsi, rsi_vals),
        (IndicatorColumn::Cci, cci_vals),
        (IndicatorColumn::BollingerTop, top),
        (IndicatorColumn::BollingerMid, mid),
        (IndicatorColumn::BollingerBottom, bottom),
    ])
}

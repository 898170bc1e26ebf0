use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Writer};
use tempfile::NamedTempFile;

use crate::indicators::{self, Column, IndicatorColumn, MIN_ROWS};
use crate::price_client::Bar;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub const BASE_HEADERS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

/// One trading period of OHLCV data.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl From<&Bar> for PriceRow {
    fn from(bar: &Bar) -> Self {
        Self {
            date: bar.date(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

impl ta::High for PriceRow {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for PriceRow {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for PriceRow {
    fn close(&self) -> f64 {
        self.close
    }
}

/// An ordered price series plus whichever indicator columns were computed
/// (or found on disk).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    rows: Vec<PriceRow>,
    indicators: Vec<Column>,
}

impl PriceTable {
    pub fn new(rows: Vec<PriceRow>) -> Self {
        Self {
            rows,
            indicators: Vec::new(),
        }
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        Self::new(bars.iter().map(PriceRow::from).collect())
    }

    /// Attach RSI, CCI and Bollinger columns when the series is long enough.
    /// Shorter series are returned untouched.
    pub fn with_indicators(mut self) -> Result<Self> {
        if self.rows.len() >= MIN_ROWS {
            self.indicators = indicators::calculate(&self.rows)?;
        }
        Ok(self)
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_indicators(&self) -> bool {
        !self.indicators.is_empty()
    }

    pub fn column(&self, which: IndicatorColumn) -> Option<&[Option<f64>]> {
        self.indicators
            .iter()
            .find(|(c, _)| *c == which)
            .map(|(_, v)| v.as_slice())
    }

    pub fn headers(&self) -> Vec<&'static str> {
        BASE_HEADERS
            .into_iter()
            .chain(self.indicators.iter().map(|(c, _)| c.header()))
            .collect()
    }

    pub fn dates(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.date.format(DATE_FORMAT).to_string())
            .collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }

    /// Write the table as CSV. The file is staged next to `path` and renamed
    /// into place, so readers never see a partial table.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;

        {
            let mut wtr = Writer::from_writer(&mut staged);
            wtr.write_record(self.headers())?;

            for (i, row) in self.rows.iter().enumerate() {
                let mut record = vec![
                    row.date.format(DATE_FORMAT).to_string(),
                    row.open.to_string(),
                    row.high.to_string(),
                    row.low.to_string(),
                    row.close.to_string(),
                    row.volume.to_string(),
                ];
                for (_, values) in &self.indicators {
                    record.push(match values.get(i).copied().flatten() {
                        Some(v) if v.is_finite() => v.to_string(),
                        _ => String::new(),
                    });
                }
                wtr.write_record(&record)?;
            }
            wtr.flush()?;
        }

        staged
            .persist(path)
            .with_context(|| format!("persist {}", path.display()))?;
        Ok(())
    }

    /// Load a table written by [`PriceTable::write_csv`]. Indicator columns
    /// are picked up only when their header is present.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open csv file {}", path.display()))?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let headers = rdr.headers()?.clone();
        let base: Vec<usize> = BASE_HEADERS
            .iter()
            .map(|name| {
                position(&headers, name).ok_or_else(|| anyhow!("missing '{name}' column"))
            })
            .collect::<Result<_>>()?;

        let indicator_pos: Vec<(IndicatorColumn, usize)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| IndicatorColumn::from_header(h).map(|c| (c, i)))
            .collect();

        let mut rows = Vec::new();
        let mut indicators: Vec<Column> = indicator_pos
            .iter()
            .map(|(c, _)| (*c, Vec::new()))
            .collect();

        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 2;
            let record = result.with_context(|| format!("read csv record at line {line}"))?;

            let field = |pos: usize| record.get(pos).unwrap_or("").trim();
            let number = |pos: usize, name: &str| -> Result<f64> {
                field(pos)
                    .parse::<f64>()
                    .with_context(|| format!("parse '{name}' at line {line}"))
            };

            let date = NaiveDate::parse_from_str(field(base[0]), DATE_FORMAT)
                .with_context(|| format!("parse 'Date' at line {line}"))?;
            let volume = field(base[5])
                .parse::<u64>()
                .with_context(|| format!("parse 'Volume' at line {line}"))?;

            rows.push(PriceRow {
                date,
                open: number(base[1], "Open")?,
                high: number(base[2], "High")?,
                low: number(base[3], "Low")?,
                close: number(base[4], "Close")?,
                volume,
            });

            for ((column, pos), (_, values)) in indicator_pos.iter().zip(indicators.iter_mut()) {
                let raw = field(*pos);
                let value = if raw.is_empty() {
                    None
                } else {
                    let v = raw
                        .parse::<f64>()
                        .with_context(|| format!("parse '{}' at line {line}", column.header()))?;
                    v.is_finite().then_some(v)
                };
                values.push(value);
            }
        }

        Ok(Self { rows, indicators })
    }
}

fn position(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

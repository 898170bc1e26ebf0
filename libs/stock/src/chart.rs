use anyhow::{Result, ensure};
use charming::{
    Chart,
    component::{
        Axis, DataZoom, Feature, Legend, Restore, SaveAsImage, Title, Toolbox, ToolboxDataZoom,
    },
    element::{AxisType, LineStyle, LineStyleType, Symbol, TextStyle, Tooltip, Trigger},
    series::Line,
};

use crate::indicators::IndicatorColumn;
use crate::series::PriceTable;

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

/// The three stacked charts shown for a ticker.
pub struct ChartSet {
    pub price: Chart,
    pub rsi: Chart,
    pub cci: Chart,
}

/// ECharts option documents, ready to hand to `setOption`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub price: String,
    pub rsi: String,
    pub cci: String,
}

impl ChartSet {
    /// Series whose source column is missing from `table` are left out.
    pub fn build(symbol: &str, table: &PriceTable) -> Result<Self> {
        ensure!(!table.is_empty(), "no rows to chart");

        let dates = table.dates();

        let mut price = base_chart(
            &format!("{} - Price & Bollinger Bands", symbol.to_uppercase()),
            &dates,
        )
        .legend(Legend::new().left("left").top("8%"))
        .series(line("Close", table.closes(), "#000000"));

        for (column, color) in [
            (IndicatorColumn::BollingerTop, "#e53935"),
            (IndicatorColumn::BollingerMid, "#1e88e5"),
            (IndicatorColumn::BollingerBottom, "#43a047"),
        ] {
            if let Some(values) = table.column(column) {
                price = price.series(line(column.header(), gaps(values), color));
            }
        }

        let mut rsi = base_chart("RSI", &dates);
        if let Some(values) = table.column(IndicatorColumn::Rsi) {
            let n = values.len();
            rsi = rsi
                .series(line("RSI", gaps(values), "#fb8c00"))
                .series(guide("Overbought", RSI_OVERBOUGHT, n))
                .series(guide("Oversold", RSI_OVERSOLD, n));
        }

        let mut cci = base_chart("CCI", &dates);
        if let Some(values) = table.column(IndicatorColumn::Cci) {
            cci = cci.series(line("CCI", gaps(values), "#8e24aa"));
        }

        Ok(Self { price, rsi, cci })
    }

    pub fn to_json(&self) -> Result<ChartOptions> {
        Ok(ChartOptions {
            price: serde_json::to_string(&self.price)?,
            rsi: serde_json::to_string(&self.rsi)?,
            cci: serde_json::to_string(&self.cci)?,
        })
    }
}

fn base_chart(title: &str, dates: &[String]) -> Chart {
    Chart::new()
        .title(
            Title::new()
                .text(title)
                .left("center")
                .text_style(TextStyle::new().font_size(14)),
        )
        .tooltip(Tooltip::new().trigger(Trigger::Axis))
        .toolbox(
            Toolbox::new().feature(
                Feature::new()
                    .data_zoom(ToolboxDataZoom::new())
                    .restore(Restore::new())
                    .save_as_image(SaveAsImage::new()),
            ),
        )
        .data_zoom(DataZoom::new())
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(dates.to_vec()),
        )
        .y_axis(Axis::new().type_(AxisType::Value).scale(true))
}

fn line(name: &str, data: Vec<f64>, color: &str) -> Line {
    Line::new()
        .name(name)
        .data(data)
        .symbol(Symbol::None)
        .line_style(LineStyle::new().width(2).color(color))
}

fn guide(name: &str, level: f64, n: usize) -> Line {
    Line::new()
        .name(name)
        .data(vec![level; n])
        .symbol(Symbol::None)
        .line_style(
            LineStyle::new()
                .width(1)
                .color("#9e9e9e")
                .type_(LineStyleType::Dashed),
        )
}

// Undefined points become NaN, which serializes as null and renders as a gap.
fn gaps(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::PriceRow;
    use chrono::NaiveDate;
    use serde_json::Value;

    fn table(n: usize) -> PriceTable {
        let first = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        PriceTable::new(
            (0..n)
                .map(|i| {
                    let c = 12.0 + (i as f64 * 0.4).sin();
                    PriceRow {
                        date: first + chrono::Duration::days(i as i64),
                        open: c,
                        high: c + 0.3,
                        low: c - 0.3,
                        close: c,
                        volume: 1_000,
                    }
                })
                .collect(),
        )
    }

    fn series_names(option: &str) -> Vec<String> {
        let v: Value = serde_json::from_str(option).unwrap();
        v["series"]
            .as_array()
            .map(|s| {
                s.iter()
                    .map(|x| x["name"].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn full_table_draws_every_series() {
        let t = table(30).with_indicators().unwrap();
        let opts = ChartSet::build("tslq", &t).unwrap().to_json().unwrap();

        assert_eq!(
            series_names(&opts.price),
            ["Close", "Bollinger Top", "Bollinger Mid", "Bollinger Bottom"]
        );
        assert_eq!(series_names(&opts.rsi), ["RSI", "Overbought", "Oversold"]);
        assert_eq!(series_names(&opts.cci), ["CCI"]);
        assert!(opts.price.contains("TSLQ - Price & Bollinger Bands"));
    }

    #[test]
    fn warm_up_points_serialize_as_null() {
        let t = table(25).with_indicators().unwrap();
        let opts = ChartSet::build("TSLQ", &t).unwrap().to_json().unwrap();
        let v: Value = serde_json::from_str(&opts.cci).unwrap();
        let data = v["series"][0]["data"].as_array().unwrap();
        assert_eq!(data.len(), 25);
        assert!(data[0].is_null());
        assert!(data[4].is_number());
    }

    #[test]
    fn short_table_only_draws_close() {
        let t = table(10).with_indicators().unwrap();
        let opts = ChartSet::build("TSLL", &t).unwrap().to_json().unwrap();
        assert_eq!(series_names(&opts.price), ["Close"]);
        assert!(series_names(&opts.rsi).is_empty());
        assert!(series_names(&opts.cci).is_empty());
    }

    #[test]
    fn empty_table_is_an_error() {
        assert!(ChartSet::build("TSLQ", &PriceTable::default()).is_err());
    }
}

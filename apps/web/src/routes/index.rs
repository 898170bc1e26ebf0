use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::America::New_York;
use serde::Deserialize;
use stock::{
    FetchRequest, PriceSource, PriceTable,
    chart::{ChartOptions, ChartSet},
    fetch_stock_data,
};
use tracing::{debug, info, info_span, instrument};

use crate::{AppState, error::AppError};

const DEFAULT_RANGE_DAYS: i64 = 14;

#[derive(Debug, Default, Deserialize)]
pub struct IndexParams {
    pub ticker: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

struct TickerOption {
    name: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage {
    ticker: String,
    tickers: Vec<TickerOption>,
    start_date: String,
    end_date: String,
    filename: String,
    charts: ChartOptions,
    version: String,
}

#[instrument(name = "index", skip_all, fields(ticker, start, end))]
pub async fn index<S: PriceSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<IndexParams>,
) -> Result<Html<String>, AppError> {
    let config = &state.config;

    let ticker = match present(params.ticker) {
        Some(raw) => config
            .find_ticker(&raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unsupported ticker: {raw}")))?,
        None => config.default_ticker(),
    }
    .to_string();

    let (start, end) = resolve_range(params.start_date, params.end_date, market_today())?;

    let span = tracing::Span::current();
    span.record("ticker", ticker.as_str());
    span.record("start", tracing::field::display(start));
    span.record("end", tracing::field::display(end));

    let request = FetchRequest::daily(&ticker, start, end);
    let no_data = || {
        AppError::NotFound(format!(
            "No data found for {ticker} between {start} and {end}"
        ))
    };

    let Some(path) = fetch_stock_data(&state.price_source, &config.data_dir, &request).await
    else {
        info!("no data for request");
        return Err(no_data());
    };
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!(path = %path.display(), "price table vanished before render");
        return Err(no_data());
    }

    let symbol = ticker.clone();
    let file = path.clone();
    let render = info_span!("render_charts");
    let charts = tokio::task::spawn_blocking(move || -> anyhow::Result<ChartOptions> {
        let _entered = render.enter();
        let table = PriceTable::read_csv(&file)?;
        debug!(rows = table.len(), "loaded price table");
        ChartSet::build(&symbol, &table)?.to_json()
    })
    .await??;

    let page = IndexPage {
        tickers: config
            .tickers
            .iter()
            .map(|t| TickerOption {
                name: t.clone(),
                selected: *t == ticker,
            })
            .collect(),
        ticker,
        start_date: start.to_string(),
        end_date: end.to_string(),
        filename: path.display().to_string(),
        charts,
        version: config.version.clone(),
    };

    Ok(Html(page.render()?))
}

/// Current calendar date on the exchange's clock.
fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Both dates must be given to be used; otherwise fall back to the
/// trailing two weeks ending `today`.
fn resolve_range(
    start: Option<String>,
    end: Option<String>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    match (present(start), present(end)) {
        (Some(start), Some(end)) => Ok((parse_date(&start)?, parse_date(&end)?)),
        _ => Ok((today - Duration::days(DEFAULT_RANGE_DAYS), today)),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date: {raw} (expected YYYY-MM-DD)")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn explicit_range_is_parsed() {
        let (start, end) = resolve_range(
            Some("2024-01-01".into()),
            Some("2024-03-01".into()),
            date(2026, 1, 1),
        )
        .unwrap();
        assert_eq!((start, end), (date(2024, 1, 1), date(2024, 3, 1)));
    }

    #[test]
    fn missing_or_empty_date_defaults_both() {
        let today = date(2024, 3, 15);
        let expected = (date(2024, 3, 1), today);
        assert_eq!(resolve_range(None, None, today).unwrap(), expected);
        assert_eq!(
            resolve_range(Some("2023-01-01".into()), None, today).unwrap(),
            expected
        );
        assert_eq!(
            resolve_range(Some("2023-01-01".into()), Some(" ".into()), today).unwrap(),
            expected
        );
    }

    #[test]
    fn malformed_date_is_rejected() {
        let err = resolve_range(
            Some("01/02/2024".into()),
            Some("2024-03-01".into()),
            date(2024, 3, 15),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

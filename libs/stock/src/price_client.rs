use std::str::FromStr;

use anyhow::{Error, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::debug;

const PAGE_LIMIT: usize = 10_000;

/// Anything that can hand back OHLCV bars for a symbol over `[start, end)`.
pub trait PriceSource: Send + Sync {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: Timeframe,
    ) -> impl Future<Output = Result<Vec<Bar>>> + Send;
}

#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: String,
}

impl PriceClient {
    pub fn new(base_api: String, key_id: String, secret: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(&key_id)?);
        headers.insert("APCA-API-SECRET-KEY", HeaderValue::from_str(&secret)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_api })
    }

    pub fn from_env() -> Result<Self> {
        let base_api = std::env::var("APCA_API_BASE_URL")?;
        let key_id = std::env::var("APCA_API_KEY_ID")?;
        let secret = std::env::var("APCA_API_SECRET_KEY")?;
        Self::new(base_api, key_id, secret)
    }

    /// Fetch every bar in `[start, end)`, following pagination tokens.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, Error> {
        let url = format!(
            "{}/v2/stocks/{}/bars",
            self.base_api.trim_end_matches('/'),
            symbol
        );

        let start_ts = midnight_utc(start).to_rfc3339();
        let end_ts = midnight_utc(end).to_rfc3339();
        let limit = PAGE_LIMIT.to_string();

        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("feed", "iex"),
                ("adjustment", "raw"),
                ("timeframe", timeframe.as_str()),
                ("start", start_ts.as_str()),
                ("end", end_ts.as_str()),
                ("limit", limit.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }

            let res: BarsResponse = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let page = res.bars.unwrap_or_default();
            debug!(symbol, page_bars = page.len(), "fetched bars page");
            bars.extend(page);

            match res.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        bars.retain(|b| b.date() < end);
        Ok(bars)
    }
}

impl PriceSource for PriceClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>> {
        self.fetch_range(symbol, start, end, timeframe).await
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

//
// Match Alpaca API JSON
// https://docs.alpaca.markets/reference/stockbars
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    #[default]
    Day1,
    Week1,
    Month1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1Min",
            Timeframe::Minute5 => "5Min",
            Timeframe::Minute15 => "15Min",
            Timeframe::Minute30 => "30Min",
            Timeframe::Hour1 => "1Hour",
            Timeframe::Day1 => "1Day",
            Timeframe::Week1 => "1Week",
            Timeframe::Month1 => "1Month",
        }
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tf = match s.trim().to_lowercase().as_str() {
            "1m" | "1min" => Timeframe::Minute1,
            "5m" | "5min" => Timeframe::Minute5,
            "15m" | "15min" => Timeframe::Minute15,
            "30m" | "30min" => Timeframe::Minute30,
            "1h" | "1hour" => Timeframe::Hour1,
            "1d" | "1day" => Timeframe::Day1,
            "1wk" | "1week" => Timeframe::Week1,
            "1mo" | "1month" => Timeframe::Month1,
            other => bail!("unsupported interval: {other}"),
        };
        Ok(tf)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: Option<Vec<Bar>>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "o")]
    pub open: f64,

    #[serde(rename = "h")]
    pub high: f64,

    #[serde(rename = "l")]
    pub low: f64,

    #[serde(rename = "c")]
    pub close: f64,

    #[serde(rename = "v")]
    pub volume: u64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

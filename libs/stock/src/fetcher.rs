use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use chrono::NaiveDate;
use tracing::{Span, debug, info, instrument, warn};

use crate::price_client::{PriceSource, Timeframe};
use crate::series::PriceTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timeframe: Timeframe,
}

impl FetchRequest {
    pub fn daily(ticker: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            start,
            end,
            timeframe: Timeframe::Day1,
        }
    }
}

/// `<dir>/<ticker>_<start>_<end>.csv`
pub fn csv_path(dir: &Path, ticker: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{}_{}_{}.csv",
        ticker,
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    ))
}

/// Fetch bars, attach indicators and persist the table under `dir`.
///
/// Returns the written file, or `None` when the provider had nothing usable.
/// Failures are logged here and never reach the caller.
#[instrument(
    name = "fetch_stock_data",
    skip_all,
    fields(ticker = %request.ticker, start = %request.start, end = %request.end)
)]
pub async fn fetch_stock_data<S: PriceSource>(
    source: &S,
    dir: &Path,
    request: &FetchRequest,
) -> Option<PathBuf> {
    match try_fetch(source, dir, request).await {
        Ok(Some(path)) => {
            info!(path = %path.display(), "price table written");
            Some(path)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = ?e, "fetch_stock_data failed");
            None
        }
    }
}

async fn try_fetch<S: PriceSource>(
    source: &S,
    dir: &Path,
    request: &FetchRequest,
) -> Result<Option<PathBuf>> {
    ensure!(!request.ticker.trim().is_empty(), "ticker is empty");

    let mut bars = source
        .fetch_bars(&request.ticker, request.start, request.end, request.timeframe)
        .await?;

    if bars.is_empty() {
        debug!("no bars returned");
        return Ok(None);
    }
    bars.sort_by_key(|b| b.timestamp);
    debug!(bars = bars.len(), "fetched price bars");

    let path = csv_path(dir, &request.ticker, request.start, request.end);
    let dir = dir.to_path_buf();
    let out = path.clone();
    let span = Span::current();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let _entered = span.enter();
        std::fs::create_dir_all(&dir)?;
        let table = PriceTable::from_bars(&bars).with_indicators()?;
        debug!(
            rows = table.len(),
            indicators = table.has_indicators(),
            "computed price table"
        );
        table.write_csv(&out)
    })
    .await??;

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorColumn;
    use crate::price_client::Bar;
    use anyhow::bail;
    use chrono::{Duration, TimeZone, Utc};
    use std::io;
    use std::sync::{Arc, Mutex};

    struct Canned(Vec<Bar>);

    impl PriceSource for Canned {
        async fn fetch_bars(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
            _timeframe: Timeframe,
        ) -> Result<Vec<Bar>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl PriceSource for Broken {
        async fn fetch_bars(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
            _timeframe: Timeframe,
        ) -> Result<Vec<Bar>> {
            bail!("connection reset by peer")
        }
    }

    fn bars(n: usize) -> Vec<Bar> {
        let first = Utc.with_ymd_and_hms(2024, 1, 2, 5, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 30.0 + (i as f64 * 0.5).sin() * 3.0;
                Bar {
                    timestamp: first + Duration::days(i as i64),
                    open: c - 0.2,
                    high: c + 0.6,
                    low: c - 0.7,
                    close: c,
                    volume: 50_000 + i as u64 * 10,
                }
            })
            .collect()
    }

    fn request() -> FetchRequest {
        FetchRequest::daily(
            "TSLQ",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[test]
    fn file_name_is_keyed_by_ticker_and_range() {
        let req = request();
        let path = csv_path(Path::new("/data"), &req.ticker, req.start, req.end);
        assert_eq!(path, PathBuf::from("/data/TSLQ_2024-01-01_2024-03-01.csv"));
    }

    #[tokio::test]
    async fn forty_rows_are_written_with_indicators() {
        let dir = tempfile::tempdir().unwrap();
        let path = fetch_stock_data(&Canned(bars(40)), dir.path(), &request())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("TSLQ_2024-01-01_2024-03-01.csv"));

        let table = PriceTable::read_csv(&path).unwrap();
        assert_eq!(table.len(), 40);
        for c in IndicatorColumn::ALL {
            let values = table.column(c).unwrap();
            assert!(values[19..].iter().all(Option::is_some), "{}", c.header());
        }
        let bottom = table.column(IndicatorColumn::BollingerBottom).unwrap();
        assert!(bottom[..19].iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn short_series_is_written_without_indicators() {
        let dir = tempfile::tempdir().unwrap();
        let path = fetch_stock_data(&Canned(bars(10)), dir.path(), &request())
            .await
            .unwrap();
        let table = PriceTable::read_csv(&path).unwrap();
        assert_eq!(table.len(), 10);
        assert!(!table.has_indicators());
    }

    #[tokio::test]
    async fn creates_missing_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("trades").join("daily");
        let path = fetch_stock_data(&Canned(bars(3)), &nested, &request()).await;
        assert!(path.unwrap().exists());
    }

    #[tokio::test]
    async fn empty_response_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = fetch_stock_data(&Canned(Vec::new()), dir.path(), &request()).await;
        assert!(path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn provider_error_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fetch_stock_data(&Broken, dir.path(), &request()).await.is_none());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn blocking_work_logs_inside_the_request_span() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        // the blocking pool threads only see the global dispatcher
        tracing::subscriber::set_global_default(subscriber).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let req = FetchRequest {
            ticker: "SPANTEST".into(),
            ..request()
        };
        assert!(fetch_stock_data(&Canned(bars(3)), dir.path(), &req).await.is_some());

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = logs
            .lines()
            .find(|l| l.contains("computed price table") && l.contains("SPANTEST"))
            .unwrap_or_else(|| panic!("no span context in:\n{logs}"));
        assert!(line.contains("fetch_stock_data{ticker=SPANTEST"), "{line}");
        assert!(line.contains("start=2024-01-01"), "{line}");
    }

    #[tokio::test]
    async fn blank_ticker_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let req = FetchRequest {
            ticker: "  ".into(),
            ..request()
        };
        assert!(fetch_stock_data(&Canned(bars(3)), dir.path(), &req).await.is_none());
    }
}

mod fetcher;
mod price_client;
mod series;

pub mod chart;
pub mod indicators;

pub use fetcher::{FetchRequest, csv_path, fetch_stock_data};
pub use price_client::{Bar, PriceClient, PriceSource, Timeframe};
pub use series::{BASE_HEADERS, PriceRow, PriceTable};

use std::{env::var, path::PathBuf};

const DEFAULT_TICKERS: [&str; 2] = ["TSLQ", "TSLL"];

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Where fetched price tables are written, and the only place downloads
    /// are served from.
    pub data_dir: PathBuf,
    /// Selectable tickers; the first one is the default.
    pub tickers: Vec<String>,
    pub version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5000,
            data_dir: PathBuf::from("data"),
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            version: "Unknown".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tickers = env_str("TICKERS")
            .map(|raw| parse_tickers(&raw))
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.tickers);

        Self {
            bind: env_str("BIND").unwrap_or(defaults.bind),
            port: env_str("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            data_dir: env_str("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tickers,
            version: env_str("APP_VERSION").unwrap_or(defaults.version),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn default_ticker(&self) -> &str {
        self.tickers
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_TICKERS[0])
    }

    /// Case-insensitive lookup against the configured tickers.
    pub fn find_ticker(&self, symbol: &str) -> Option<&str> {
        let symbol = symbol.trim();
        self.tickers
            .iter()
            .find(|t| t.eq_ignore_ascii_case(symbol))
            .map(String::as_str)
    }
}

fn env_str(name: &str) -> Option<String> {
    var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

use std::time::Duration;

use crate::error::{AppError, Result};

pub const HKJC_URL: &str = "https://bet.hkjc.com/football/getJSON.aspx";

/// Records per `search_result.aspx` page. Fixed by the endpoint.
pub const PAGE_SIZE: usize = 20;

/// Rotate the session after this many result pages.
pub const RESULTS_ROTATE_EVERY: usize = 10;

/// Rotate the session after this many odds lookups (per worker).
pub const ODDS_ROTATE_EVERY: usize = 50;

/// Retries after the first attempt, for retryable statuses and connect errors.
pub const MAX_RETRIES: u32 = 5;

/// First retry delay in milliseconds. Doubles on every further retry.
pub const RETRY_BACKOFF_BASE_MS: u64 = 100;

/// Statuses treated as transient server errors.
pub const RETRY_STATUSES: &[u16] = &[500, 502, 503, 504];

/// Endpoint `jsontype` values.
pub mod jsontype {
    pub const SEARCH_RESULT: &str = "search_result.aspx";
    pub const LAST_ODDS: &str = "last_odds.aspx";
    pub const FULL_MATCH_LIST: &str = "fullmatchlist";
    pub const ALL_ODDS: &str = "odds_allodds.aspx";
}

/// Everything a `TransportClient` needs to open sessions and retry calls.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            max_retries: MAX_RETRIES,
            backoff_base: Duration::from_millis(RETRY_BACKOFF_BASE_MS),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportConfig,
    pub log_level: String,
    /// Finished-match output (PAST_CSV_PATH)
    pub past_csv_path: String,
    /// Upcoming-match output (UPCOMING_CSV_PATH)
    pub upcoming_csv_path: String,
    /// Length of the results search window ending today (LOOKBACK_MONTHS)
    pub lookback_months: u32,
    /// Concurrent odds workers, each with its own session (ODDS_WORKERS)
    pub odds_workers: usize,
    /// Only scrape finished matches (SKIP_UPCOMING)
    pub skip_upcoming: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let timeout_secs = get("HTTP_TIMEOUT_SECS", "30").parse::<u64>().map_err(|_| {
            AppError::Config("HTTP_TIMEOUT_SECS must be a whole number of seconds".to_string())
        })?;

        let odds_workers = get("ODDS_WORKERS", "1")
            .parse::<usize>()
            .map_err(|_| AppError::Config("ODDS_WORKERS must be a positive integer".to_string()))?;
        if odds_workers == 0 {
            return Err(AppError::Config("ODDS_WORKERS must be at least 1".to_string()));
        }

        let lookback_months = get("LOOKBACK_MONTHS", "1")
            .parse::<u32>()
            .map_err(|_| AppError::Config("LOOKBACK_MONTHS must be a whole number".to_string()))?;

        Ok(Self {
            transport: TransportConfig::new(
                get("HKJC_URL", HKJC_URL),
                Duration::from_secs(timeout_secs),
            ),
            log_level: get("LOG_LEVEL", "info"),
            past_csv_path: get("PAST_CSV_PATH", "hkjc_football.csv"),
            upcoming_csv_path: get("UPCOMING_CSV_PATH", "hkjc_football_upcoming.csv"),
            lookback_months,
            odds_workers,
            skip_upcoming: get("SKIP_UPCOMING", "false").eq_ignore_ascii_case("true"),
        })
    }
}

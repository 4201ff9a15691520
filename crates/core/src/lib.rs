pub mod domain;
pub mod ingest;
pub mod measure;
pub mod progress;
pub mod publish;
pub mod run;
pub mod storage;

pub mod config {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
    const DEFAULT_TIPRANKS_BASE_URL: &str = "https://www.tipranks.com";
    const DEFAULT_FINNHUB_TOKEN_FILE: &str = "financedataprovidertoken.txt";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
    const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 10;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub finnhub_token: Option<String>,
        pub finnhub_token_file: PathBuf,
        pub finnhub_base_url: String,
        pub tipranks_base_url: String,
        pub provider_timeout: Duration,
        pub cache_dir: PathBuf,
        pub report_dir: PathBuf,
        pub retry_delay: Duration,
        /// `None` retries transient failures forever.
        pub retry_max_attempts: Option<u32>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        /// Reads the process environment, then falls back to the token file
        /// for the Finnhub token.
        pub fn from_env() -> anyhow::Result<Self> {
            let mut settings = Self::from_lookup(|key| std::env::var(key).ok());
            if settings.finnhub_token.is_none() {
                settings.finnhub_token = load_token_file(&settings.finnhub_token_file);
            }
            Ok(settings)
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
            let var = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            let parse_u64 = |key: &str, default: u64| {
                var(key)
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(default)
            };

            let retry_max_attempts = match var("RETRY_MAX_ATTEMPTS").and_then(|s| s.parse::<u32>().ok()) {
                Some(0) => None,
                Some(n) => Some(n),
                None => Some(DEFAULT_RETRY_MAX_ATTEMPTS),
            };

            Self {
                finnhub_token: var("FINNHUB_TOKEN"),
                finnhub_token_file: var("FINNHUB_TOKEN_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FINNHUB_TOKEN_FILE)),
                finnhub_base_url: var("FINNHUB_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_FINNHUB_BASE_URL.to_string()),
                tipranks_base_url: var("TIPRANKS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_TIPRANKS_BASE_URL.to_string()),
                provider_timeout: Duration::from_secs(parse_u64("PROVIDER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
                cache_dir: var("PRICE_TARGETS_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("cache")),
                report_dir: var("PRICE_TARGETS_REPORT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("reports")),
                retry_delay: Duration::from_millis(parse_u64("RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)),
                retry_max_attempts,
                sentry_dsn: var("SENTRY_DSN"),
            }
        }
    }

    /// Reads a provider token from a local file. A missing or empty file is
    /// not an error: the provider runs unauthenticated or gets skipped.
    pub fn load_token_file(path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(s) => {
                let token = s.trim().to_string();
                if token.is_empty() {
                    tracing::warn!(path = %path.display(), "token file is empty");
                    return None;
                }
                Some(token)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "token file not found");
                None
            }
        }
    }

}

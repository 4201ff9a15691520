use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, DNS) or a retryable HTTP status.
    #[error("{provider}: transient failure: {detail}")]
    Transient { provider: &'static str, detail: String },

    /// The provider cannot serve this query (missing credentials, plan restriction).
    #[error("{provider}: unsupported: {detail}")]
    Unsupported { provider: &'static str, detail: String },

    #[error("{provider}: no data for {ticker}")]
    NotFound { provider: &'static str, ticker: String },

    #[error("{provider}: unexpected response: {detail}")]
    Malformed { provider: &'static str, detail: String },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classifies a reqwest error. A request that could not even be built
    /// (bad base URL, bad header) is a configuration problem, not a network one.
    pub fn from_reqwest(provider: &'static str, ticker: &str, err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::Unsupported {
                provider,
                detail: format!("invalid request configuration: {err}"),
            };
        }
        if err.is_decode() {
            return Self::Malformed {
                provider,
                detail: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return Self::from_status(provider, status, ticker, err.to_string());
        }
        Self::Transient {
            provider,
            detail: err.to_string(),
        }
    }

    pub fn from_status(
        provider: &'static str,
        status: reqwest::StatusCode,
        ticker: &str,
        detail: String,
    ) -> Self {
        use reqwest::StatusCode;

        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Self::Transient { provider, detail }
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Unsupported { provider, detail }
        } else if status == StatusCode::NOT_FOUND {
            Self::NotFound {
                provider,
                ticker: ticker.to_string(),
            }
        } else {
            Self::Malformed { provider, detail }
        }
    }
}

/// Failure of the aggregated lookup for one ticker.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transient(ProviderError),

    #[error("no provider returned usable data for {ticker}: {}", .reasons.join("; "))]
    DataUnavailable { ticker: String, reasons: Vec<String> },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

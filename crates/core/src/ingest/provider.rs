use crate::domain::stock::RecommendationTrend;
use crate::ingest::error::ProviderError;
use anyhow::Context;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Whatever one provider knows about a ticker. Every field is optional; the
/// manager merges several of these field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderQuote {
    pub current_price: Option<f64>,
    pub price_target: Option<f64>,
    pub recommendation_trend: Option<RecommendationTrend>,
}

impl ProviderQuote {
    pub fn is_empty(&self) -> bool {
        self.current_price.is_none()
            && self.price_target.is_none()
            && self.recommendation_trend.is_none()
    }
}

#[async_trait::async_trait]
pub trait FinanceDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_company_info(&self, ticker: &str) -> Result<ProviderQuote, ProviderError>;
}

pub(crate) fn build_http_client(provider: &'static str, timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .with_context(|| format!("failed to build {provider} http client"))
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// GET + status classification + JSON decode, shared by the HTTP providers.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    http: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    query: &[(&str, &str)],
    ticker: &str,
) -> Result<T, ProviderError> {
    let res = http
        .get(url)
        .headers(headers)
        .query(query)
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, ticker, e))?;

    let status = res.status();
    let text = res
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, ticker, e))?;

    if !status.is_success() {
        return Err(ProviderError::from_status(
            provider,
            status,
            ticker,
            format!("HTTP {status}: {}", truncate(&text, 200)),
        ));
    }

    serde_json::from_str::<T>(&text).map_err(|e| ProviderError::Malformed {
        provider,
        detail: format!("{e}: {}", truncate(&text, 200)),
    })
}

pub(crate) fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 responder on a loopback port. Routes on the request
    /// path with the query string stripped; unknown paths answer 404.
    /// Returns the base URL to point a provider at.
    pub(crate) async fn serve_stub(routes: Vec<(&'static str, u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: HashMap<&'static str, (u16, String)> =
            routes.into_iter().map(|(path, code, body)| (path, (code, body))).collect();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf);
                    let target = head.split_whitespace().nth(1).unwrap_or("/");
                    let path = target.split('?').next().unwrap_or(target);
                    let (code, body) = routes
                        .get(path)
                        .cloned()
                        .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));
                    let response = format!(
                        "HTTP/1.1 {code} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    #[test]
    fn joins_urls_without_double_slashes() {
        assert_eq!(join_url("https://finnhub.io/api/v1/", "/quote"), "https://finnhub.io/api/v1/quote");
        assert_eq!(join_url("https://finnhub.io/api/v1", "quote"), "https://finnhub.io/api/v1/quote");
    }

    #[test]
    fn positive_filters_zero_and_nan() {
        assert_eq!(positive(Some(1.5)), Some(1.5));
        assert_eq!(positive(Some(0.0)), None);
        assert_eq!(positive(Some(f64::NAN)), None);
        assert_eq!(positive(None), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("가나다라", 2), "가나");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn empty_quote() {
        assert!(ProviderQuote::default().is_empty());
        let q = ProviderQuote {
            price_target: Some(10.0),
            ..Default::default()
        };
        assert!(!q.is_empty());
    }
}

use crate::config::Settings;
use crate::domain::stock::{RecommendationPeriod, RecommendationTrend};
use crate::ingest::error::ProviderError;
use crate::ingest::provider::{build_http_client, get_json, join_url, positive, FinanceDataProvider, ProviderQuote};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const NAME: &str = "finnhub";

#[derive(Debug, Clone)]
pub struct FinnhubProvider {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    /// Current price; Finnhub answers 0 for unknown symbols.
    c: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinnhubPriceTarget {
    target_mean: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinnhubRecommendation {
    #[serde(default)]
    period: String,
    #[serde(default)]
    strong_buy: u32,
    #[serde(default)]
    buy: u32,
    #[serde(default)]
    hold: u32,
    #[serde(default)]
    sell: u32,
    #[serde(default)]
    strong_sell: u32,
}

impl From<FinnhubRecommendation> for RecommendationPeriod {
    fn from(r: FinnhubRecommendation) -> Self {
        Self {
            period: r.period,
            strong_buy: r.strong_buy,
            buy: r.buy,
            hold: r.hold,
            sell: r.sell,
            strong_sell: r.strong_sell,
        }
    }
}

impl FinnhubProvider {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = build_http_client(NAME, settings.provider_timeout)?;
        if settings.finnhub_token.is_none() {
            tracing::warn!("finnhub token not configured; finnhub provider will be skipped");
        }

        Ok(Self {
            http,
            base_url: settings.finnhub_base_url.clone(),
            token: settings.finnhub_token.clone(),
        })
    }

    fn headers(&self, token: &str) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(token).map_err(|e| ProviderError::Unsupported {
            provider: NAME,
            detail: format!("invalid token: {e}"),
        })?;
        headers.insert("X-Finnhub-Token", value);
        Ok(headers)
    }

    async fn get<T: DeserializeOwned>(&self, token: &str, path: &str, ticker: &str) -> Result<T, ProviderError> {
        let url = join_url(&self.base_url, path);
        get_json(NAME, &self.http, &url, self.headers(token)?, &[("symbol", ticker)], ticker).await
    }

    /// Optional endpoints: transient errors still abort, anything else only drops the field.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        ticker: &str,
    ) -> Result<Option<T>, ProviderError> {
        match self.get::<T>(token, path, ticker).await {
            Ok(v) => Ok(Some(v)),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                tracing::debug!(%ticker, path, error = %err, "finnhub optional endpoint unavailable");
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl FinanceDataProvider for FinnhubProvider {
    fn provider_name(&self) -> &'static str {
        NAME
    }

    async fn fetch_company_info(&self, ticker: &str) -> Result<ProviderQuote, ProviderError> {
        let Some(token) = self.token.as_deref() else {
            return Err(ProviderError::Unsupported {
                provider: NAME,
                detail: "no API token configured".to_string(),
            });
        };

        let quote: FinnhubQuote = self.get(token, "/quote", ticker).await?;
        let price_target = self
            .get_optional::<FinnhubPriceTarget>(token, "/stock/price-target", ticker)
            .await?;
        let recommendations = self
            .get_optional::<Vec<FinnhubRecommendation>>(token, "/stock/recommendation", ticker)
            .await?;

        let out = into_quote(quote, price_target, recommendations);
        if out.is_empty() {
            return Err(ProviderError::NotFound {
                provider: NAME,
                ticker: ticker.to_string(),
            });
        }
        Ok(out)
    }
}

fn into_quote(
    quote: FinnhubQuote,
    price_target: Option<FinnhubPriceTarget>,
    recommendations: Option<Vec<FinnhubRecommendation>>,
) -> ProviderQuote {
    let recommendation_trend = recommendations
        .filter(|r| !r.is_empty())
        .map(|r| r.into_iter().map(RecommendationPeriod::from).collect::<RecommendationTrend>());

    ProviderQuote {
        current_price: positive(quote.c),
        price_target: positive(price_target.and_then(|p| p.target_mean)),
        recommendation_trend,
    }
}

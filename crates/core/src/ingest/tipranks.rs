use crate::config::Settings;
use crate::domain::stock::RecommendationPeriod;
use crate::ingest::error::ProviderError;
use crate::ingest::provider::{build_http_client, get_json, join_url, positive, FinanceDataProvider, ProviderQuote};
use reqwest::header::HeaderMap;
use serde::Deserialize;

const NAME: &str = "tipranks";
const DATA_PATH: &str = "/api/stocks/getData/";

/// Unauthenticated TipRanks stock page data.
#[derive(Debug, Clone)]
pub struct TipRanksProvider {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TipRanksData {
    #[serde(default)]
    pt_consensus: Vec<TipRanksPriceTarget>,
    #[serde(default)]
    prices: Vec<TipRanksPrice>,
    #[serde(default)]
    consensuses: Vec<TipRanksConsensus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TipRanksPriceTarget {
    price_target: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TipRanksPrice {
    p: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TipRanksConsensus {
    #[serde(default)]
    d: String,
    #[serde(rename = "nB", default)]
    buys: u32,
    #[serde(rename = "nH", default)]
    holds: u32,
    #[serde(rename = "nS", default)]
    sells: u32,
}

impl TipRanksProvider {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http_client(NAME, settings.provider_timeout)?,
            base_url: settings.tipranks_base_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl FinanceDataProvider for TipRanksProvider {
    fn provider_name(&self) -> &'static str {
        NAME
    }

    async fn fetch_company_info(&self, ticker: &str) -> Result<ProviderQuote, ProviderError> {
        let url = join_url(&self.base_url, DATA_PATH);
        let name = ticker.to_ascii_lowercase();
        let data: TipRanksData =
            get_json(NAME, &self.http, &url, HeaderMap::new(), &[("name", name.as_str())], ticker).await?;

        let out = into_quote(data);
        if out.is_empty() {
            return Err(ProviderError::NotFound {
                provider: NAME,
                ticker: ticker.to_string(),
            });
        }
        Ok(out)
    }
}

fn into_quote(data: TipRanksData) -> ProviderQuote {
    let price_target = positive(data.pt_consensus.first().and_then(|c| c.price_target));
    let current_price = positive(data.prices.last().and_then(|p| p.p));

    // TipRanks has no strong buy/sell split.
    let trend: Vec<RecommendationPeriod> = data
        .consensuses
        .into_iter()
        .map(|c| RecommendationPeriod {
            period: c.d,
            strong_buy: 0,
            buy: c.buys,
            hold: c.holds,
            sell: c.sells,
            strong_sell: 0,
        })
        .collect();

    ProviderQuote {
        current_price,
        price_target,
        recommendation_trend: (!trend.is_empty()).then_some(trend),
    }
}

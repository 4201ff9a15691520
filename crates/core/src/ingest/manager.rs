use crate::config::Settings;
use crate::domain::stock::CompanyInfo;
use crate::ingest::error::FetchError;
use crate::ingest::finnhub::FinnhubProvider;
use crate::ingest::provider::{FinanceDataProvider, ProviderQuote};
use crate::ingest::tipranks::TipRanksProvider;
use std::sync::Arc;

/// Queries providers in priority order and merges their answers field by field.
pub struct FinanceDataManager {
    providers: Vec<Arc<dyn FinanceDataProvider>>,
}

impl FinanceDataManager {
    pub fn new(providers: Vec<Arc<dyn FinanceDataProvider>>) -> Self {
        Self { providers }
    }

    /// Finnhub first (authoritative when a token is present), TipRanks second.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let providers: Vec<Arc<dyn FinanceDataProvider>> = vec![
            Arc::new(FinnhubProvider::from_settings(settings)?),
            Arc::new(TipRanksProvider::from_settings(settings)?),
        ];
        Ok(Self::new(providers))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    pub async fn get_company_info(&self, ticker: &str) -> Result<CompanyInfo, FetchError> {
        let mut merged = ProviderQuote::default();
        let mut sources = Vec::new();
        let mut reasons = Vec::new();

        for provider in &self.providers {
            if is_complete(&merged) {
                break;
            }

            match provider.fetch_company_info(ticker).await {
                Ok(quote) => {
                    if merge_missing(&mut merged, quote) {
                        sources.push(provider.provider_name());
                    }
                }
                Err(err) if err.is_transient() => return Err(FetchError::Transient(err)),
                Err(err) => {
                    tracing::debug!(%ticker, provider = provider.provider_name(), error = %err, "provider skipped");
                    reasons.push(err.to_string());
                }
            }
        }

        let Some(current_price) = merged.current_price else {
            if self.providers.is_empty() {
                reasons.push("no providers configured".to_string());
            } else if reasons.is_empty() {
                reasons.push("no provider reported a current price".to_string());
            }
            return Err(FetchError::DataUnavailable {
                ticker: ticker.to_string(),
                reasons,
            });
        };

        Ok(CompanyInfo {
            ticker: ticker.to_string(),
            current_price,
            price_target: merged.price_target,
            recommendation_trend: merged.recommendation_trend.unwrap_or_default(),
            sources,
        })
    }
}

fn is_complete(q: &ProviderQuote) -> bool {
    q.current_price.is_some() && q.price_target.is_some() && q.recommendation_trend.is_some()
}

/// Fills only the fields still missing in `into`. Returns whether anything was taken.
fn merge_missing(into: &mut ProviderQuote, from: ProviderQuote) -> bool {
    let mut took = false;
    if into.current_price.is_none() && from.current_price.is_some() {
        into.current_price = from.current_price;
        took = true;
    }
    if into.price_target.is_none() && from.price_target.is_some() {
        into.price_target = from.price_target;
        took = true;
    }
    if into.recommendation_trend.is_none() && from.recommendation_trend.is_some() {
        into.recommendation_trend = from.recommendation_trend;
        took = true;
    }
    took
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::stock::RecommendationPeriod;
    use crate::ingest::error::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed script of responses, then repeats the last one.
    pub(crate) struct ScriptedProvider {
        pub name: &'static str,
        pub script: Vec<Result<ProviderQuote, ProviderError>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn new(name: &'static str, script: Vec<Result<ProviderQuote, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                script,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl FinanceDataProvider for ScriptedProvider {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_company_info(&self, _ticker: &str) -> Result<ProviderQuote, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.script.len().saturating_sub(1));
            self.script[idx].clone()
        }
    }

    pub(crate) fn dyn_list(ps: &[&Arc<ScriptedProvider>]) -> Vec<Arc<dyn FinanceDataProvider>> {
        ps.iter()
            .map(|p| Arc::clone(*p) as Arc<dyn FinanceDataProvider>)
            .collect()
    }

    pub(crate) fn quote(price: Option<f64>, target: Option<f64>) -> ProviderQuote {
        ProviderQuote {
            current_price: price,
            price_target: target,
            recommendation_trend: None,
        }
    }

    fn trend(buy: u32) -> Vec<RecommendationPeriod> {
        vec![RecommendationPeriod {
            period: "2026-10-01".to_string(),
            buy,
            ..Default::default()
        }]
    }

    fn transient(provider: &'static str) -> ProviderError {
        ProviderError::Transient {
            provider,
            detail: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn first_provider_wins_per_field_and_gaps_fall_through() {
        let first = ScriptedProvider::new("first", vec![Ok(quote(Some(100.0), None))]);
        let second = ScriptedProvider::new(
            "second",
            vec![Ok(ProviderQuote {
                current_price: Some(99.0),
                price_target: Some(120.0),
                recommendation_trend: Some(trend(3)),
            })],
        );
        let manager = FinanceDataManager::new(dyn_list(&[&first, &second]));

        let info = manager.get_company_info("AAA").await.unwrap();
        assert_eq!(info.current_price, 100.0);
        assert_eq!(info.price_target, Some(120.0));
        assert_eq!(info.recommendation_trend, trend(3));
        assert_eq!(info.sources, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn stops_once_every_field_is_filled() {
        let first = ScriptedProvider::new(
            "first",
            vec![Ok(ProviderQuote {
                current_price: Some(10.0),
                price_target: Some(11.0),
                recommendation_trend: Some(trend(1)),
            })],
        );
        let second = ScriptedProvider::new("second", vec![Ok(quote(Some(1.0), Some(1.0)))]);
        let manager = FinanceDataManager::new(dyn_list(&[&first, &second]));

        let info = manager.get_company_info("AAA").await.unwrap();
        assert_eq!(info.sources, vec!["first"]);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn permanent_errors_skip_the_provider() {
        let first = ScriptedProvider::new(
            "first",
            vec![Err(ProviderError::Unsupported {
                provider: "first",
                detail: "no API token configured".to_string(),
            })],
        );
        let second = ScriptedProvider::new("second", vec![Ok(quote(Some(50.0), Some(40.0)))]);
        let manager = FinanceDataManager::new(dyn_list(&[&first, &second]));

        let info = manager.get_company_info("BBB").await.unwrap();
        assert_eq!(info.current_price, 50.0);
        assert_eq!(info.price_target, Some(40.0));
        assert!(info.recommendation_trend.is_empty());
        assert_eq!(info.sources, vec!["second"]);
    }

    #[tokio::test]
    async fn transient_error_is_propagated_without_trying_the_rest() {
        let first = ScriptedProvider::new("first", vec![Err(transient("first"))]);
        let second = ScriptedProvider::new("second", vec![Ok(quote(Some(1.0), None))]);
        let manager = FinanceDataManager::new(dyn_list(&[&first, &second]));

        let err = manager.get_company_info("ZZZ").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn data_unavailable_when_no_provider_has_a_price() {
        let first = ScriptedProvider::new(
            "first",
            vec![Err(ProviderError::NotFound {
                provider: "first",
                ticker: "NOPE".to_string(),
            })],
        );
        let second = ScriptedProvider::new("second", vec![Ok(quote(None, Some(12.0)))]);
        let manager = FinanceDataManager::new(dyn_list(&[&first, &second]));

        match manager.get_company_info("NOPE").await {
            Err(FetchError::DataUnavailable { ticker, reasons }) => {
                assert_eq!(ticker, "NOPE");
                assert_eq!(reasons, vec!["first: no data for NOPE".to_string()]);
            }
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_providers_is_data_unavailable() {
        let manager = FinanceDataManager::new(vec![]);
        let err = manager.get_company_info("AAA").await.unwrap_err();
        assert!(matches!(err, FetchError::DataUnavailable { .. }));
    }
}

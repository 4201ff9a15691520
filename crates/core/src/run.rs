use crate::config::Settings;
use crate::domain::stock::StockInfo;
use crate::ingest::error::FetchError;
use crate::ingest::manager::FinanceDataManager;
use crate::measure;
use crate::progress::ProgressSink;
use crate::publish;
use crate::storage::cache::StockInfoCache;
use crate::storage::report::ReportStorage;
use anyhow::Context;
use std::collections::HashMap;
use std::time::Duration;

/// How transient fetch failures are retried for a single ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Total attempts per ticker, first one included. `None` never gives up.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            delay: settings.retry_delay,
            max_attempts: settings.retry_max_attempts,
        }
    }

    /// Retries until the provider answers, however long that takes.
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    fn allows_another(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report_location: String,
    pub items: usize,
    pub fetched: usize,
    pub from_cache: usize,
    pub unavailable: Vec<String>,
    pub retries: u32,
}

pub struct Pipeline<'a> {
    manager: &'a FinanceDataManager,
    cache: &'a dyn StockInfoCache,
    storage: &'a dyn ReportStorage,
    progress: &'a dyn ProgressSink,
    retry: RetryPolicy,
}

enum TickerOutcome {
    Done(StockInfo),
    Unavailable,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        manager: &'a FinanceDataManager,
        cache: &'a dyn StockInfoCache,
        storage: &'a dyn ReportStorage,
        progress: &'a dyn ProgressSink,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            manager,
            cache,
            storage,
            progress,
            retry,
        }
    }

    /// Processes `tickers` in order, writes the report and clears the cache.
    ///
    /// The cache is read once up front. Any error before the report is saved
    /// leaves the cache untouched, so the next run resumes from it.
    pub async fn run(&self, tickers: &[String]) -> anyhow::Result<RunSummary> {
        let total = tickers.len();
        let snapshot: HashMap<String, StockInfo> = self
            .cache
            .get_all()
            .await
            .context("failed to read result cache")?
            .into_iter()
            .map(|s| (s.ticker.clone(), s))
            .collect();

        tracing::info!(
            tickers = total,
            cached = snapshot.len(),
            providers = ?self.manager.provider_names(),
            "price target run started"
        );

        let mut items = Vec::with_capacity(total);
        let mut unavailable = Vec::new();
        let mut fetched: usize = 0;
        let mut from_cache: usize = 0;
        let mut retries: u32 = 0;

        for (idx, ticker) in tickers.iter().enumerate() {
            let position = idx + 1;

            if let Some(cached) = snapshot.get(ticker) {
                self.progress.publish(&format!("{ticker} {position}/{total}"));
                tracing::debug!(%ticker, "cache hit");
                items.push(cached.clone());
                from_cache += 1;
                continue;
            }

            match self.process_ticker(ticker, position, total, &mut retries).await? {
                TickerOutcome::Done(info) => {
                    items.push(info);
                    fetched += 1;
                }
                TickerOutcome::Unavailable => unavailable.push(ticker.clone()),
            }
        }

        let report = publish::create_report(items, unavailable);
        let formatted = publish::format_report(&report)?;
        let report_location = self
            .storage
            .save_report(&formatted)
            .await
            .context("failed to save report")?;

        self.cache
            .clear()
            .await
            .context("report saved but failed to clear result cache")?;
        self.progress.publish("report saved");

        tracing::info!(
            report_id = %report.id,
            %report_location,
            items = report.items.len(),
            fetched,
            from_cache,
            unavailable = report.unavailable.len(),
            retries,
            "price target run finished"
        );

        Ok(RunSummary {
            report_location,
            items: report.items.len(),
            fetched,
            from_cache,
            unavailable: report.unavailable,
            retries,
        })
    }

    /// Fetch, score, build and cache one ticker, retrying transient failures.
    async fn process_ticker(
        &self,
        ticker: &str,
        position: usize,
        total: usize,
        retries: &mut u32,
    ) -> anyhow::Result<TickerOutcome> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.progress.publish(&format!("{ticker} {position}/{total}"));

            let company = match self.manager.get_company_info(ticker).await {
                Ok(company) => company,
                Err(FetchError::Transient(err)) => {
                    if !self.retry.allows_another(attempt) {
                        self.progress
                            .publish(&format!("{ticker} {position}/{total} failed, giving up"));
                        return Err(anyhow::Error::new(err)
                            .context(format!("{ticker}: giving up after {attempt} attempts")));
                    }

                    *retries += 1;
                    tracing::warn!(%ticker, attempt, delay = ?self.retry.delay, error = %err, "transient fetch failure; retrying");
                    self.progress
                        .publish(&format!("{ticker} {position}/{total} failed, retrying"));
                    tokio::time::sleep(self.retry.delay).await;
                    continue;
                }
                Err(err @ FetchError::DataUnavailable { .. }) => {
                    tracing::warn!(%ticker, error = %err, "no usable data; leaving ticker out of the report");
                    self.progress
                        .publish(&format!("{ticker} {position}/{total} no data"));
                    return Ok(TickerOutcome::Unavailable);
                }
            };

            let price_level = measure::price_expectation_level(company.current_price, company.price_target);
            let trend_level = measure::trend_expectation_level(&company.recommendation_trend);

            let info = publish::create_publish_item(
                ticker,
                company.current_price,
                company.price_target,
                price_level,
                company.recommendation_trend,
                trend_level,
            )?;

            self.cache
                .save(&info)
                .await
                .with_context(|| format!("{ticker}: failed to write cache entry"))?;

            tracing::debug!(
                %ticker,
                attempt,
                sources = ?company.sources,
                price_level = %price_level,
                trend_level = %trend_level,
                "ticker processed"
            );
            return Ok(TickerOutcome::Done(info));
        }
    }
}

use crate::domain::expectation::ExpectationLevel;
use crate::domain::stock::{RecommendationTrend, Report, StockInfo};
use anyhow::{ensure, Context};
use chrono::Utc;
use uuid::Uuid;

pub fn create_publish_item(
    ticker: &str,
    current_price: f64,
    price_target: Option<f64>,
    price_expectation: ExpectationLevel,
    recommendation_trend: RecommendationTrend,
    trend_expectation: ExpectationLevel,
) -> anyhow::Result<StockInfo> {
    let ticker = ticker.trim().to_string();
    ensure!(!ticker.is_empty(), "ticker must be non-empty");
    ensure!(
        current_price.is_finite() && current_price > 0.0,
        "{ticker}: current price must be positive (got {current_price})"
    );
    if let Some(target) = price_target {
        ensure!(
            target.is_finite() && target > 0.0,
            "{ticker}: price target must be positive (got {target})"
        );
    }

    Ok(StockInfo {
        ticker,
        current_price,
        price_target,
        price_expectation,
        recommendation_trend,
        trend_expectation,
        created_at: Utc::now(),
    })
}

/// Keeps `items` in the order given; the caller collects them in ticker-list order.
pub fn create_report(items: Vec<StockInfo>, unavailable: Vec<String>) -> Report {
    Report {
        id: Uuid::new_v4(),
        generated_at: Utc::now(),
        items,
        unavailable,
    }
}

pub fn format_report(report: &Report) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(report).context("failed to serialize report")
}

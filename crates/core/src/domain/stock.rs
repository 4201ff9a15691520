use crate::domain::expectation::ExpectationLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analyst rating counts for one reporting period (usually a month).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationPeriod {
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

impl RecommendationPeriod {
    pub fn total(&self) -> u64 {
        u64::from(self.strong_buy)
            + u64::from(self.buy)
            + u64::from(self.hold)
            + u64::from(self.sell)
            + u64::from(self.strong_sell)
    }
}

/// Newest period first, as the providers return it.
pub type RecommendationTrend = Vec<RecommendationPeriod>;

/// Merged provider data for one ticker. Never persisted as is.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyInfo {
    pub ticker: String,
    pub current_price: f64,
    pub price_target: Option<f64>,
    pub recommendation_trend: RecommendationTrend,
    pub sources: Vec<&'static str>,
}

/// One fully processed ticker. This is both the cache entry and the report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub ticker: String,
    pub current_price: f64,
    pub price_target: Option<f64>,
    pub price_expectation: ExpectationLevel,
    pub recommendation_trend: RecommendationTrend,
    pub trend_expectation: ExpectationLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<StockInfo>,
    /// Tickers for which no provider had usable data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<String>,
}

/// Trims and upper-cases a raw symbol. Returns `None` for blank input.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    Some(t.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_ticker() {
        assert_eq!(normalize_ticker("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_ticker("BRK.B"), Some("BRK.B".to_string()));
        assert_eq!(normalize_ticker("   "), None);
    }

    #[test]
    fn period_total_does_not_overflow() {
        let p = RecommendationPeriod {
            period: "2026-10-01".to_string(),
            strong_buy: u32::MAX,
            buy: u32::MAX,
            hold: 0,
            sell: 0,
            strong_sell: 0,
        };
        assert_eq!(p.total(), 2 * u64::from(u32::MAX));
    }
}

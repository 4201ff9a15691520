use crate::domain::expectation::ExpectationLevel;
use crate::domain::stock::RecommendationPeriod;

// Upside (target / price - 1) thresholds.
const PRICE_STRONG_UPSIDE: f64 = 0.25;
const PRICE_UPSIDE: f64 = 0.05;
const PRICE_DOWNSIDE: f64 = -0.05;
const PRICE_STRONG_DOWNSIDE: f64 = -0.25;

// Mean analyst rating on a -2 (strong sell) ..= +2 (strong buy) scale.
const TREND_STRONG_BULLISH: f64 = 1.0;
const TREND_BULLISH: f64 = 0.3;
const TREND_BEARISH: f64 = -0.3;
const TREND_STRONG_BEARISH: f64 = -1.0;

/// Relative gap between the consensus target and the current price.
pub fn price_upside(current_price: f64, price_target: Option<f64>) -> Option<f64> {
    let target = price_target?;
    if !current_price.is_finite() || !target.is_finite() || current_price <= 0.0 || target <= 0.0 {
        return None;
    }
    Some((target - current_price) / current_price)
}

pub fn price_expectation_level(current_price: f64, price_target: Option<f64>) -> ExpectationLevel {
    let Some(upside) = price_upside(current_price, price_target) else {
        return ExpectationLevel::Unknown;
    };

    if upside >= PRICE_STRONG_UPSIDE {
        ExpectationLevel::StronglyBullish
    } else if upside >= PRICE_UPSIDE {
        ExpectationLevel::Bullish
    } else if upside > PRICE_DOWNSIDE {
        ExpectationLevel::Neutral
    } else if upside > PRICE_STRONG_DOWNSIDE {
        ExpectationLevel::Bearish
    } else {
        ExpectationLevel::StronglyBearish
    }
}

/// Count-weighted mean rating over every period. `None` when there are no ratings at all.
pub fn mean_recommendation(trend: &[RecommendationPeriod]) -> Option<f64> {
    let mut total: u64 = 0;
    let mut weighted: i128 = 0;
    for p in trend {
        total += p.total();
        weighted += 2 * i128::from(p.strong_buy) + i128::from(p.buy)
            - i128::from(p.sell)
            - 2 * i128::from(p.strong_sell);
    }

    if total == 0 {
        return None;
    }
    Some(weighted as f64 / total as f64)
}

pub fn trend_expectation_level(trend: &[RecommendationPeriod]) -> ExpectationLevel {
    let Some(mean) = mean_recommendation(trend) else {
        return ExpectationLevel::Neutral;
    };

    if mean >= TREND_STRONG_BULLISH {
        ExpectationLevel::StronglyBullish
    } else if mean >= TREND_BULLISH {
        ExpectationLevel::Bullish
    } else if mean > TREND_BEARISH {
        ExpectationLevel::Neutral
    } else if mean > TREND_STRONG_BEARISH {
        ExpectationLevel::Bearish
    } else {
        ExpectationLevel::StronglyBearish
    }
}

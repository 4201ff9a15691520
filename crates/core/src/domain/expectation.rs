use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationLevel {
    /// Not enough (or invalid) input to say anything.
    Unknown,
    StronglyBearish,
    Bearish,
    Neutral,
    Bullish,
    StronglyBullish,
}

impl ExpectationLevel {
    /// Position on the bearish..bullish scale; `None` for `Unknown`.
    pub fn score(self) -> Option<i8> {
        match self {
            Self::Unknown => None,
            Self::StronglyBearish => Some(-2),
            Self::Bearish => Some(-1),
            Self::Neutral => Some(0),
            Self::Bullish => Some(1),
            Self::StronglyBullish => Some(2),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::StronglyBearish => "strongly_bearish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
            Self::Bullish => "bullish",
            Self::StronglyBullish => "strongly_bullish",
        }
    }
}

impl fmt::Display for ExpectationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case() {
        let v = serde_json::to_value(ExpectationLevel::StronglyBullish).unwrap();
        assert_eq!(v, serde_json::json!("strongly_bullish"));
        let back: ExpectationLevel = serde_json::from_value(serde_json::json!("bearish")).unwrap();
        assert_eq!(back, ExpectationLevel::Bearish);
    }

    #[test]
    fn display_matches_serde_name() {
        for level in [
            ExpectationLevel::Unknown,
            ExpectationLevel::StronglyBearish,
            ExpectationLevel::Bearish,
            ExpectationLevel::Neutral,
            ExpectationLevel::Bullish,
            ExpectationLevel::StronglyBullish,
        ] {
            let v = serde_json::to_value(level).unwrap();
            assert_eq!(v.as_str(), Some(level.to_string().as_str()));
        }
    }
}

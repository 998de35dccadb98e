use serde::{Deserialize, Serialize};

use common::TradingConfig;

/// Market regime derived from trend strength (ADX).
///
/// Signals are only taken in the Neutral and Trending bands: below the
/// choppy threshold direction is noise, above the extreme threshold moves
/// are too violent for the stop geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Choppy,
    Neutral,
    Trending,
    Extreme,
}

impl Regime {
    /// Pure function of the current row's ADX — no history, no state.
    pub fn classify(adx: f64, cfg: &TradingConfig) -> Regime {
        if adx < cfg.adx_choppy_threshold {
            Regime::Choppy
        } else if adx > cfg.adx_extreme_threshold {
            Regime::Extreme
        } else if adx < cfg.adx_trending_threshold {
            Regime::Neutral
        } else {
            Regime::Trending
        }
    }

    pub fn is_tradeable(&self) -> bool {
        matches!(self, Regime::Neutral | Regime::Trending)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Choppy => write!(f, "choppy"),
            Regime::Neutral => write!(f, "neutral"),
            Regime::Trending => write!(f, "trending"),
            Regime::Extreme => write!(f, "extreme"),
        }
    }
}

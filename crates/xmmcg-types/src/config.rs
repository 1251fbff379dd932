//! Configuration for a competition instance.
//!
//! Every field has a default, so a partial JSON document is a valid config:
//!
//! ```json
//! { "reviews_per_participant": 3, "tie_break": "random", "rng_seed": 7 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CompetitionError, Result, Tokens, constants};

/// How equal top bids on one item are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// Earliest `submitted_at`, then earliest admission sequence.
    #[default]
    EarliestSubmission,
    /// Uniform draw among the tied bids from the injected random source.
    Random,
}

/// Price charged for a fallback (random) award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPrice {
    /// The configured `min_bid`.
    #[default]
    MinimumBid,
    /// A fixed amount.
    Fixed(Tokens),
}

/// Second-pass assignment of leftover items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    pub enabled: bool,
    pub price: FallbackPrice,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            price: FallbackPrice::MinimumBid,
        }
    }
}

impl FallbackPolicy {
    /// The price of one fallback award, given the round minimum bid.
    #[must_use]
    pub fn floor(&self, min_bid: Tokens) -> Tokens {
        match self.price {
            FallbackPrice::MinimumBid => min_bid,
            FallbackPrice::Fixed(price) => price,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `xmmcg_allocation=debug`.
    pub level: String,
    /// Emit JSON lines instead of the compact formatter.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: constants::DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionConfig {
    /// Tokens credited to each participant on registration.
    pub initial_tokens: Tokens,
    pub min_bid: Tokens,
    pub max_bid: Tokens,
    /// Open bids a participant may hold in one round.
    pub max_open_bids_per_participant: usize,
    /// K: assignments per reviewer and per submission.
    pub reviews_per_participant: usize,
    pub max_review_score: u32,
    pub max_comment_len: usize,
    pub tie_break: TieBreakPolicy,
    pub fallback: FallbackPolicy,
    /// Seed for the allocation random source. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    pub logging: LoggingConfig,
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            initial_tokens: constants::DEFAULT_INITIAL_TOKENS,
            min_bid: constants::DEFAULT_MIN_BID,
            max_bid: constants::DEFAULT_MAX_BID,
            max_open_bids_per_participant: constants::DEFAULT_MAX_OPEN_BIDS,
            reviews_per_participant: constants::DEFAULT_REVIEWS_PER_PARTICIPANT,
            max_review_score: constants::DEFAULT_MAX_REVIEW_SCORE,
            max_comment_len: constants::DEFAULT_MAX_COMMENT_LEN,
            tie_break: TieBreakPolicy::default(),
            fallback: FallbackPolicy::default(),
            rng_seed: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl CompetitionConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// The price charged for a fallback award.
    #[must_use]
    pub fn fallback_price(&self) -> Tokens {
        self.fallback.floor(self.min_bid)
    }

    /// Reject settings no round could run under.
    pub fn validate(&self) -> Result<()> {
        if self.min_bid == 0 {
            return Err(config_error("min_bid must be positive"));
        }
        if self.min_bid > self.max_bid {
            return Err(config_error(format!(
                "min_bid {} exceeds max_bid {}",
                self.min_bid, self.max_bid
            )));
        }
        if self.max_open_bids_per_participant == 0 {
            return Err(config_error("max_open_bids_per_participant must be positive"));
        }
        if self.reviews_per_participant == 0 {
            return Err(config_error("reviews_per_participant must be positive"));
        }
        if self.max_review_score == 0 {
            return Err(config_error("max_review_score must be positive"));
        }
        if let FallbackPrice::Fixed(price) = self.fallback.price {
            if price == 0 || price > self.max_bid {
                return Err(config_error(format!(
                    "fixed fallback price {price} outside 1..={}",
                    self.max_bid
                )));
            }
        }
        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> CompetitionError {
    CompetitionError::Configuration(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = CompetitionConfig::default();
        assert_eq!(cfg.initial_tokens, 100);
        assert_eq!(cfg.max_bid, 999);
        assert_eq!(cfg.reviews_per_participant, 8);
        assert_eq!(cfg.tie_break, TieBreakPolicy::EarliestSubmission);
        assert!(cfg.fallback.enabled);
        assert_eq!(cfg.fallback_price(), cfg.min_bid);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = CompetitionConfig::from_json_str(
            r#"{ "reviews_per_participant": 3, "tie_break": "random", "rng_seed": 7 }"#,
        )
        .unwrap();
        assert_eq!(cfg.reviews_per_participant, 3);
        assert_eq!(cfg.tie_break, TieBreakPolicy::Random);
        assert_eq!(cfg.rng_seed, Some(7));
        assert_eq!(cfg.min_bid, 1);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn fixed_fallback_price_from_json() {
        let cfg = CompetitionConfig::from_json_str(
            r#"{ "fallback": { "price": { "fixed": 10 } } }"#,
        )
        .unwrap();
        assert!(cfg.fallback.enabled);
        assert_eq!(cfg.fallback_price(), 10);
    }

    #[test]
    fn invalid_settings_are_config_errors() {
        let cases = [
            CompetitionConfig { min_bid: 0, ..Default::default() },
            CompetitionConfig { min_bid: 10, max_bid: 5, ..Default::default() },
            CompetitionConfig { reviews_per_participant: 0, ..Default::default() },
            CompetitionConfig { max_review_score: 0, ..Default::default() },
            CompetitionConfig {
                fallback: FallbackPolicy { enabled: true, price: FallbackPrice::Fixed(0) },
                ..Default::default()
            },
            CompetitionConfig {
                fallback: FallbackPolicy { enabled: true, price: FallbackPrice::Fixed(1000) },
                ..Default::default()
            },
        ];
        for cfg in cases {
            let err = cfg.validate().unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Config, "{cfg:?}");
        }
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = CompetitionConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CompetitionError::Serialization(_)));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = CompetitionConfig {
            rng_seed: Some(42),
            tie_break: TieBreakPolicy::Random,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CompetitionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}

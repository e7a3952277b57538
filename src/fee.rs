//! Confirmation priority tiers and fee policies.

use bitcoin::FeeRate;
use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatedTransactionPriority {
    Fastest,
    ThirtyMinutes,
    SixtyMinutes,
}

/// Tier used both to quote a consolidation and to submit it.
pub const CONSOLIDATION_PRIORITY: EstimatedTransactionPriority = EstimatedTransactionPriority::SixtyMinutes;

impl EstimatedTransactionPriority {
    pub fn nominal_duration(&self) -> Duration {
        match self {
            EstimatedTransactionPriority::Fastest => Duration::minutes(10),
            EstimatedTransactionPriority::ThirtyMinutes => Duration::minutes(30),
            EstimatedTransactionPriority::SixtyMinutes => Duration::minutes(60),
        }
    }

    /// Confirmation target in blocks, as asked of a fee estimator.
    pub fn target_blocks(&self) -> usize {
        match self {
            EstimatedTransactionPriority::Fastest => 1,
            EstimatedTransactionPriority::ThirtyMinutes => 3,
            EstimatedTransactionPriority::SixtyMinutes => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatedTransactionPriority::Fastest => "fastest",
            EstimatedTransactionPriority::ThirtyMinutes => "thirty_minutes",
            EstimatedTransactionPriority::SixtyMinutes => "sixty_minutes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    Rate(FeeRate),
}

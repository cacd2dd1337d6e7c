use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MAX_READING_DEPTH, WEIGHT_AMBIENT, WEIGHT_COMMITTED, WEIGHT_ENGAGED};
use crate::error::{CoreError, Result};
use crate::time::Timestamp;

/// Interaction tier of an event's base weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightTier {
    Ambient,
    Engaged,
    Committed,
}

impl WeightTier {
    pub fn weight(self) -> f64 {
        match self {
            WeightTier::Ambient => WEIGHT_AMBIENT,
            WeightTier::Engaged => WEIGHT_ENGAGED,
            WeightTier::Committed => WEIGHT_COMMITTED,
        }
    }

    /// Nearest tier for an arbitrary weight. Midpoints between tiers split
    /// the range so off-tier weights from older capture clients still bucket.
    pub fn of(base_weight: f64) -> Self {
        if base_weight >= (WEIGHT_ENGAGED + WEIGHT_COMMITTED) / 2.0 {
            WeightTier::Committed
        } else if base_weight >= (WEIGHT_AMBIENT + WEIGHT_ENGAGED) / 2.0 {
            WeightTier::Engaged
        } else {
            WeightTier::Ambient
        }
    }
}

impl fmt::Display for WeightTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeightTier::Ambient => "ambient",
            WeightTier::Engaged => "engaged",
            WeightTier::Committed => "committed",
        };
        f.write_str(s)
    }
}

impl FromStr for WeightTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ambient" => Ok(WeightTier::Ambient),
            "engaged" => Ok(WeightTier::Engaged),
            "committed" => Ok(WeightTier::Committed),
            other => Err(CoreError::InvalidInput(format!("unknown weight tier '{other}'"))),
        }
    }
}

/// One captured interaction with a topic. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub base_weight: f64,
    pub relevance: f64,
    #[serde(default = "default_reading_depth")]
    pub reading_depth: f64,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub word_count: u32,
}

fn default_reading_depth() -> f64 {
    1.0
}

impl EngagementEvent {
    pub fn new(topic_id: Uuid, tier: WeightTier, relevance: f64, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_id,
            base_weight: tier.weight(),
            relevance,
            reading_depth: default_reading_depth(),
            timestamp,
            source_url: None,
            word_count: 0,
        }
    }

    pub fn with_reading_depth(mut self, depth: f64) -> Self {
        self.reading_depth = depth;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_word_count(mut self, words: u32) -> Self {
        self.word_count = words;
        self
    }

    pub fn tier(&self) -> WeightTier {
        WeightTier::of(self.base_weight)
    }

    /// Reject events that would corrupt evidence. Never corrects silently.
    pub fn validate(&self) -> Result<()> {
        if !self.base_weight.is_finite() || self.base_weight < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "base_weight must be a non-negative number, got {}",
                self.base_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.relevance) {
            return Err(CoreError::InvalidInput(format!(
                "relevance must be in [0, 1], got {}",
                self.relevance
            )));
        }
        if !(0.0..=MAX_READING_DEPTH).contains(&self.reading_depth) {
            return Err(CoreError::InvalidInput(format!(
                "reading_depth must be in [0, {MAX_READING_DEPTH}], got {}",
                self.reading_depth
            )));
        }
        Ok(())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::State;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Drift,
    Imbalance,
    Gap,
    FalseStability,
    SilentGrowth,
    Acceleration,
    Deceleration,
    RabbitHole,
    ConsumptionTrap,
    Return,
    Milestone,
}

impl InsightKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightKind::Drift => "drift",
            InsightKind::Imbalance => "imbalance",
            InsightKind::Gap => "gap",
            InsightKind::FalseStability => "false_stability",
            InsightKind::SilentGrowth => "silent_growth",
            InsightKind::Acceleration => "acceleration",
            InsightKind::Deceleration => "deceleration",
            InsightKind::RabbitHole => "rabbit_hole",
            InsightKind::ConsumptionTrap => "consumption_trap",
            InsightKind::Return => "return",
            InsightKind::Milestone => "milestone",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a topic's child distribution moved against its baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    /// Saturated and Latent both grew: going deep on few, dropping the rest.
    DeepeningButNarrowing,
    Deepening,
    Cooling,
    Broadening,
    Shifting,
}

impl DriftDirection {
    pub fn label(self) -> &'static str {
        match self {
            DriftDirection::DeepeningButNarrowing => "deepening but narrowing",
            DriftDirection::Deepening => "deepening",
            DriftDirection::Cooling => "cooling",
            DriftDirection::Broadening => "broadening",
            DriftDirection::Shifting => "shifting",
        }
    }
}

/// Per-kind payload. The variant is the insight's type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InsightDetail {
    Drift {
        direction: DriftDirection,
        /// current − baseline per state bucket
        bucket_deltas: [f64; 4],
    },
    Imbalance {
        share: f64,
        child_state: State,
    },
    Gap {
        current_latent: u32,
        baseline_latent: f64,
    },
    FalseStability {
        window_days: i64,
        evidence_gained: f64,
        event_count: usize,
    },
    SilentGrowth {
        window_days: i64,
        evidence_gained: f64,
        ambient_events: usize,
    },
    Acceleration,
    Deceleration,
    RabbitHole {
        url_count: usize,
        window_minutes: i64,
        span_minutes: i64,
    },
    ConsumptionTrap {
        word_count: u64,
        window_days: i64,
        event_count: usize,
    },
    Return {
        previous_state: State,
        current_state: State,
    },
    Milestone {
        reached_state: State,
    },
}

impl InsightDetail {
    pub fn kind(&self) -> InsightKind {
        match self {
            InsightDetail::Drift { .. } => InsightKind::Drift,
            InsightDetail::Imbalance { .. } => InsightKind::Imbalance,
            InsightDetail::Gap { .. } => InsightKind::Gap,
            InsightDetail::FalseStability { .. } => InsightKind::FalseStability,
            InsightDetail::SilentGrowth { .. } => InsightKind::SilentGrowth,
            InsightDetail::Acceleration => InsightKind::Acceleration,
            InsightDetail::Deceleration => InsightKind::Deceleration,
            InsightDetail::RabbitHole { .. } => InsightKind::RabbitHole,
            InsightDetail::ConsumptionTrap { .. } => InsightKind::ConsumptionTrap,
            InsightDetail::Return { .. } => InsightKind::Return,
            InsightDetail::Milestone { .. } => InsightKind::Milestone,
        }
    }
}

/// One detected pattern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub topic_id: Uuid,
    pub subtopic_id: Option<Uuid>,
    pub severity: Severity,
    pub current_value: f64,
    pub baseline_value: f64,
    pub change_percent: Option<f64>,
    #[serde(flatten)]
    pub detail: InsightDetail,
}

impl Insight {
    pub fn kind(&self) -> InsightKind {
        self.detail.kind()
    }
}

/// Percent change from `baseline` to `current`; `None` when the baseline is zero.
pub fn percent_change(current: f64, baseline: f64) -> Option<f64> {
    if baseline.abs() < crate::constants::EPSILON {
        None
    } else {
        Some((current - baseline) / baseline * 100.0)
    }
}

/// Highest severity first. Stable, so detector order breaks ties.
pub fn rank(insights: &mut [Insight]) {
    insights.sort_by(|a, b| b.severity.cmp(&a.severity));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(severity: Severity, detail: InsightDetail) -> Insight {
        Insight {
            topic_id: Uuid::nil(),
            subtopic_id: None,
            severity,
            current_value: 1.0,
            baseline_value: 0.5,
            change_percent: percent_change(1.0, 0.5),
            detail,
        }
    }

    #[test]
    fn test_serialized_shape() {
        let i = insight(
            Severity::Low,
            InsightDetail::RabbitHole {
                url_count: 5,
                window_minutes: 60,
                span_minutes: 59,
            },
        );
        let v = serde_json::to_value(&i).unwrap();
        assert_eq!(v["type"], "rabbit_hole");
        assert_eq!(v["severity"], "low");
        assert_eq!(v["url_count"], 5);
        assert_eq!(v["change_percent"], 100.0);

        let back: Insight = serde_json::from_value(v).unwrap();
        assert_eq!(back, i);
    }

    #[test]
    fn test_unit_variant_serializes() {
        let v = serde_json::to_value(insight(Severity::High, InsightDetail::Acceleration)).unwrap();
        assert_eq!(v["type"], "acceleration");
    }

    #[test]
    fn test_rank_orders_by_severity() {
        let mut v = vec![
            insight(Severity::Low, InsightDetail::Acceleration),
            insight(Severity::High, InsightDetail::Deceleration),
            insight(Severity::Medium, InsightDetail::Acceleration),
        ];
        rank(&mut v);
        let sev: Vec<_> = v.iter().map(|i| i.severity).collect();
        assert_eq!(sev, vec![Severity::High, Severity::Medium, Severity::Low]);
    }

    #[test]
    fn test_percent_change_zero_baseline() {
        assert_eq!(percent_change(3.0, 0.0), None);
        assert_eq!(percent_change(1.5, 1.0), Some(50.0));
    }
}

//! False stability and silent growth.
//!
//! Every Saturated child is a candidate. Confirmation reads the child's
//! trailing event window:
//! - barely any evidence added and few events: confirmed false stability
//!   (the state is coasting on old mass), upgraded to medium;
//! - otherwise, only ambient events: reclassified as silent growth, low;
//! - otherwise: dropped.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baseline::Baseline;
use crate::constants::{STABILITY_EPSILON, STABILITY_MIN_EVENTS, STABILITY_WINDOW_DAYS};
use crate::error::CoreError;
use crate::event::WeightTier;
use crate::evidence::contribution;
use crate::insight::{Insight, InsightDetail, Severity};
use crate::snapshot::Snapshot;
use crate::source::EnrichmentSource;
use crate::state::State;
use crate::time::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilityConfig {
    pub window_days: i64,
    pub epsilon: f64,
    pub min_events: usize,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_days: STABILITY_WINDOW_DAYS,
            epsilon: STABILITY_EPSILON,
            min_events: STABILITY_MIN_EVENTS,
        }
    }
}

/// An unconfirmed Saturated child.
#[derive(Clone, Debug, PartialEq)]
pub struct StabilityCandidate {
    pub topic_id: Uuid,
    pub subtopic_id: Uuid,
    pub evidence: f64,
    pub baseline_evidence: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DropReason {
    /// Neither condition held; the child is genuinely active.
    Unconfirmed,
    /// The enrichment query failed or timed out.
    Unavailable(CoreError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DroppedCandidate {
    pub candidate: StabilityCandidate,
    pub reason: DropReason,
}

#[derive(Clone, Debug, Default)]
pub struct Confirmation {
    pub insights: Vec<Insight>,
    pub dropped: Vec<DroppedCandidate>,
}

pub fn candidates(snapshot: &Snapshot, baseline: &Baseline) -> Vec<StabilityCandidate> {
    snapshot
        .topics
        .iter()
        .flat_map(|ts| {
            ts.children
                .iter()
                .filter(|c| c.state == State::Saturated)
                .map(|c| StabilityCandidate {
                    topic_id: ts.topic_id,
                    subtopic_id: c.id,
                    evidence: c.evidence,
                    baseline_evidence: baseline.child_evidence(c.id),
                })
        })
        .collect()
}

pub fn confirm_candidates<E: EnrichmentSource>(
    candidates: &[StabilityCandidate],
    source: &E,
    now: Timestamp,
    config: &StabilityConfig,
) -> Confirmation {
    let since = now - Duration::days(config.window_days);
    let mut out = Confirmation::default();

    for candidate in candidates {
        let events = match source.window_events(candidate.subtopic_id, since) {
            Ok(events) => events,
            Err(e) => {
                out.dropped.push(DroppedCandidate {
                    candidate: candidate.clone(),
                    reason: DropReason::Unavailable(e),
                });
                continue;
            }
        };
        let window: Vec<_> = events
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= now)
            .collect();

        let gained: f64 = window.iter().map(|e| contribution(e)).sum();
        let ambient = window
            .iter()
            .filter(|e| e.tier() == WeightTier::Ambient)
            .count();

        let detail = if gained < config.epsilon && window.len() < config.min_events {
            Some((
                Severity::Medium,
                InsightDetail::FalseStability {
                    window_days: config.window_days,
                    evidence_gained: gained,
                    event_count: window.len(),
                },
            ))
        } else if !window.is_empty() && ambient == window.len() {
            Some((
                Severity::Low,
                InsightDetail::SilentGrowth {
                    window_days: config.window_days,
                    evidence_gained: gained,
                    ambient_events: ambient,
                },
            ))
        } else {
            None
        };

        match detail {
            Some((severity, detail)) => out.insights.push(Insight {
                topic_id: candidate.topic_id,
                subtopic_id: Some(candidate.subtopic_id),
                severity,
                current_value: candidate.evidence,
                baseline_value: candidate.baseline_evidence.unwrap_or(candidate.evidence),
                change_percent: candidate
                    .baseline_evidence
                    .and_then(|b| crate::insight::percent_change(candidate.evidence, b)),
                detail,
            }),
            None => out.dropped.push(DroppedCandidate {
                candidate: candidate.clone(),
                reason: DropReason::Unconfirmed,
            }),
        }
    }
    out
}

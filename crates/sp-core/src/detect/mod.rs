//! Insight detection.
//!
//! Two passes:
//! 1. [`detect_candidates`]: every pure detector runs independently over the
//!    snapshot, baseline and recent raw events; results are concatenated.
//!    Saturated children come back as stability candidates, unconfirmed.
//! 2. [`confirm_candidates`]: each candidate is checked against its trailing
//!    event window through an injected [`EnrichmentSource`]. Candidates whose
//!    query fails are dropped, never reported.
//!
//! [`detect_insights`] runs both and ranks the merged list.

pub mod activity;
pub mod drift;
pub mod imbalance;
pub mod progress;
pub mod stability;
pub mod trend;

use std::collections::HashMap;

use uuid::Uuid;

use crate::baseline::Baseline;
use crate::event::EngagementEvent;
use crate::insight::{Insight, rank};
use crate::snapshot::Snapshot;
use crate::source::EnrichmentSource;
use crate::time::Timestamp;

pub use stability::{
    DropReason, DroppedCandidate, StabilityCandidate, StabilityConfig, confirm_candidates,
};

/// Everything a detection run reads.
#[derive(Clone, Copy, Debug)]
pub struct DetectionInput<'a> {
    pub snapshot: &'a Snapshot,
    pub baseline: &'a Baseline,
    /// Raw events covering at least the longest raw-history window (7 days).
    pub recent_events: &'a [EngagementEvent],
    pub now: Timestamp,
}

/// Output of the pure pass.
#[derive(Clone, Debug, Default)]
pub struct DetectionPass {
    pub insights: Vec<Insight>,
    pub candidates: Vec<StabilityCandidate>,
}

/// Final output of a detection run.
#[derive(Clone, Debug, Default)]
pub struct DetectionReport {
    pub insights: Vec<Insight>,
    pub dropped: Vec<DroppedCandidate>,
}

/// Run every pure detector. Order of detectors does not affect the result set.
pub fn detect_candidates(input: &DetectionInput<'_>) -> DetectionPass {
    let mut insights = Vec::new();
    insights.extend(drift::detect(input.snapshot, input.baseline));
    insights.extend(imbalance::detect(input.snapshot));
    insights.extend(drift::detect_gaps(input.snapshot, input.baseline));
    insights.extend(trend::detect(input.snapshot, input.baseline));
    insights.extend(progress::detect(input.snapshot, input.baseline));

    let grouped = group_by_subtopic(input.snapshot, input.recent_events);
    insights.extend(activity::detect_rabbit_holes(&grouped, input.now));
    insights.extend(activity::detect_consumption_traps(&grouped, input.now));

    DetectionPass {
        insights,
        candidates: stability::candidates(input.snapshot, input.baseline),
    }
}

/// Both passes, merged and ranked by severity.
pub fn detect_insights<E: EnrichmentSource>(
    input: &DetectionInput<'_>,
    enrichment: &E,
    config: &StabilityConfig,
) -> DetectionReport {
    let pass = detect_candidates(input);
    let confirmed = confirm_candidates(&pass.candidates, enrichment, input.now, config);

    let mut insights = pass.insights;
    insights.extend(confirmed.insights);
    rank(&mut insights);

    DetectionReport {
        insights,
        dropped: confirmed.dropped,
    }
}

/// Where an event sits in a snapshot's tree: (root topic, subtopic).
/// Only a root without children is its own leaf, `(root, None)`.
pub(crate) type Placement = (Uuid, Option<Uuid>);

/// Recent events per leaf, in snapshot order.
pub(crate) type Grouped<'a> = Vec<(Placement, Vec<&'a EngagementEvent>)>;

pub(crate) fn group_by_subtopic<'a>(
    snapshot: &Snapshot,
    events: &'a [EngagementEvent],
) -> Grouped<'a> {
    let mut grouped: Grouped<'a> = Vec::new();
    let mut slot: HashMap<Uuid, usize> = HashMap::new();
    for ts in &snapshot.topics {
        if ts.children.is_empty() {
            slot.insert(ts.topic_id, grouped.len());
            grouped.push(((ts.topic_id, None), Vec::new()));
        }
        for child in &ts.children {
            slot.insert(child.id, grouped.len());
            grouped.push(((ts.topic_id, Some(child.id)), Vec::new()));
        }
    }

    for event in events {
        if let Some(&i) = slot.get(&event.topic_id) {
            grouped[i].1.push(event);
        }
    }
    grouped.retain(|(_, events)| !events.is_empty());
    grouped
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::error::CoreError;
    use crate::event::WeightTier;
    use crate::insight::{InsightKind, Severity};

    #[test]
    fn test_merged_report_is_ranked() {
        // 10 total, one Saturated child at 70% → high imbalance + candidate
        let snap = snapshot(&[7.0, 1.5, 1.5]);
        let base = baseline(&snap, [0.0, 3.0, 0.0, 0.0], 3.0);
        let input = DetectionInput {
            snapshot: &snap,
            baseline: &base,
            recent_events: &[],
            now: now(),
        };
        let no_events = |_: Uuid, _: Timestamp| -> crate::error::Result<Vec<EngagementEvent>> {
            Ok(Vec::new())
        };

        let report = detect_insights(&input, &no_events, &StabilityConfig::default());
        let kinds: Vec<_> = report.insights.iter().map(|i| i.kind()).collect();
        assert!(kinds.contains(&InsightKind::Imbalance));
        assert!(kinds.contains(&InsightKind::Acceleration));
        assert!(kinds.contains(&InsightKind::FalseStability));
        assert!(report.dropped.is_empty());
        for pair in report.insights.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
        assert_eq!(report.insights[0].severity, Severity::High);
    }

    #[test]
    fn test_failed_enrichment_drops_only_candidate() {
        let snap = snapshot(&[7.0, 1.5, 1.5]);
        let base = baseline(&snap, [0.0, 3.0, 0.0, 0.0], 3.0);
        let input = DetectionInput {
            snapshot: &snap,
            baseline: &base,
            recent_events: &[],
            now: now(),
        };
        let failing = |id: Uuid, _: Timestamp| -> crate::error::Result<Vec<EngagementEvent>> {
            Err(CoreError::EnrichmentUnavailable {
                subject: id.to_string(),
                reason: "timed out".into(),
            })
        };

        let report = detect_insights(&input, &failing, &StabilityConfig::default());
        assert!(
            !report
                .insights
                .iter()
                .any(|i| i.kind() == InsightKind::FalseStability)
        );
        assert!(report.insights.iter().any(|i| i.kind() == InsightKind::Imbalance));
        assert_eq!(report.dropped.len(), 1);
    }

    #[test]
    fn test_group_by_subtopic_places_events() {
        let snap = snapshot(&[1.0, 2.0]);
        let ts = &snap.topics[0];
        let events = vec![
            EngagementEvent::new(ts.children[0].id, WeightTier::Ambient, 1.0, now()),
            EngagementEvent::new(ts.topic_id, WeightTier::Ambient, 1.0, now()),
            EngagementEvent::new(Uuid::new_v4(), WeightTier::Ambient, 1.0, now()),
        ];
        let grouped = group_by_subtopic(&snap, &events);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].0, (ts.topic_id, Some(ts.children[0].id)));
        assert_eq!(grouped[0].1.len(), 1);
    }

    #[test]
    fn test_childless_root_is_its_own_leaf() {
        let snap = snapshot(&[]);
        let root = snap.topics[0].topic_id;
        let events = vec![EngagementEvent::new(root, WeightTier::Ambient, 1.0, now())];
        let grouped = group_by_subtopic(&snap, &events);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].0, (root, None));
    }

    #[test]
    fn test_grouping_follows_snapshot_order() {
        let snap = snapshot(&[1.0, 1.0, 1.0, 1.0, 1.0]);
        let ids: Vec<Uuid> = snap.topics[0].children.iter().map(|c| c.id).collect();
        let events: Vec<EngagementEvent> = ids
            .iter()
            .rev()
            .map(|&id| EngagementEvent::new(id, WeightTier::Ambient, 1.0, now()))
            .collect();
        let grouped = group_by_subtopic(&snap, &events);
        let order: Vec<Uuid> = grouped.iter().filter_map(|(p, _)| p.1).collect();
        assert_eq!(order, ids);
    }
}

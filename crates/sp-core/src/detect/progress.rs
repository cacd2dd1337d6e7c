//! Positive state changes against baseline: returns and milestones.

use crate::baseline::Baseline;
use crate::insight::{Insight, InsightDetail, Severity, percent_change};
use crate::snapshot::Snapshot;
use crate::state::State;

pub fn detect(snapshot: &Snapshot, baseline: &Baseline) -> Vec<Insight> {
    let mut out = Vec::new();
    for ts in &snapshot.topics {
        let Some(base) = baseline.topic(ts.topic_id) else {
            continue;
        };
        let previous = State::classify(base.avg_evidence);
        let current = State::classify(ts.total_evidence);
        if current <= previous {
            continue;
        }

        let insight = |detail| Insight {
            topic_id: ts.topic_id,
            subtopic_id: None,
            severity: Severity::Low,
            current_value: ts.total_evidence,
            baseline_value: base.avg_evidence,
            change_percent: percent_change(ts.total_evidence, base.avg_evidence),
            detail,
        };

        // A dormant topic picked back up
        if previous == State::Latent {
            out.push(insight(InsightDetail::Return {
                previous_state: previous,
                current_state: current,
            }));
        }
        if current >= State::Engaged {
            out.push(insight(InsightDetail::Milestone {
                reached_state: current,
            }));
        }
    }
    out
}

use crate::baseline::Baseline;
use crate::constants::{
    ACCELERATION_PCT, ACCELERATION_PCT_HIGH, DECELERATION_PCT, DECELERATION_PCT_HIGH,
};
use crate::insight::{Insight, InsightDetail, Severity, percent_change};
use crate::snapshot::Snapshot;

/// Total-evidence momentum against baseline.
pub fn detect(snapshot: &Snapshot, baseline: &Baseline) -> Vec<Insight> {
    let mut out = Vec::new();
    for ts in &snapshot.topics {
        let Some(base) = baseline.topic(ts.topic_id) else {
            continue;
        };
        let Some(pct) = percent_change(ts.total_evidence, base.avg_evidence) else {
            continue;
        };

        let (severity, detail) = if pct > ACCELERATION_PCT {
            let sev = if pct > ACCELERATION_PCT_HIGH {
                Severity::High
            } else {
                Severity::Medium
            };
            (sev, InsightDetail::Acceleration)
        } else if pct < DECELERATION_PCT {
            let sev = if pct < DECELERATION_PCT_HIGH {
                Severity::High
            } else {
                Severity::Medium
            };
            (sev, InsightDetail::Deceleration)
        } else {
            continue;
        };

        out.push(Insight {
            topic_id: ts.topic_id,
            subtopic_id: None,
            severity,
            current_value: ts.total_evidence,
            baseline_value: base.avg_evidence,
            change_percent: Some(pct),
            detail,
        });
    }
    out
}

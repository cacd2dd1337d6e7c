//! Histogram comparisons against baseline: drift and gaps.

use crate::baseline::Baseline;
use crate::constants::{DRIFT_HIGH, DRIFT_MEDIUM, EPSILON, GAP_LATENT_INCREASE};
use crate::insight::{DriftDirection, Insight, InsightDetail, Severity, percent_change};
use crate::snapshot::Snapshot;
use crate::state::State;

/// L1 distance between current and baseline child distributions.
pub fn detect(snapshot: &Snapshot, baseline: &Baseline) -> Vec<Insight> {
    let mut out = Vec::new();
    for ts in &snapshot.topics {
        let Some(base) = baseline.topic(ts.topic_id) else {
            continue;
        };

        let current = ts.histogram.as_array();
        let mut deltas = [0.0; 4];
        for (i, d) in deltas.iter_mut().enumerate() {
            *d = current[i] as f64 - base.avg_histogram[i];
        }
        let distance: f64 = deltas.iter().map(|d| d.abs()).sum();

        let severity = if distance > DRIFT_HIGH {
            Severity::High
        } else if distance > DRIFT_MEDIUM {
            Severity::Medium
        } else {
            continue;
        };

        out.push(Insight {
            topic_id: ts.topic_id,
            subtopic_id: None,
            severity,
            current_value: distance,
            baseline_value: 0.0,
            change_percent: None,
            detail: InsightDetail::Drift {
                direction: direction(&deltas),
                bucket_deltas: deltas,
            },
        });
    }
    out
}

/// Name the movement from which buckets gained or lost children.
pub fn direction(deltas: &[f64; 4]) -> DriftDirection {
    let d = |s: State| deltas[s.index()];
    let gained = |s: State| d(s) > EPSILON;

    let upper = d(State::Engaged) + d(State::Saturated);
    let lower = d(State::Latent) + d(State::Discovered);

    if gained(State::Saturated) && gained(State::Latent) {
        DriftDirection::DeepeningButNarrowing
    } else if upper > EPSILON && lower < -EPSILON {
        DriftDirection::Deepening
    } else if upper < -EPSILON && gained(State::Latent) {
        DriftDirection::Cooling
    } else if gained(State::Discovered) && d(State::Latent) < -EPSILON {
        DriftDirection::Broadening
    } else {
        DriftDirection::Shifting
    }
}

/// More children went dormant than usual.
pub fn detect_gaps(snapshot: &Snapshot, baseline: &Baseline) -> Vec<Insight> {
    let mut out = Vec::new();
    for ts in &snapshot.topics {
        let Some(base) = baseline.topic(ts.topic_id) else {
            continue;
        };

        let current = ts.histogram.get(State::Latent);
        let expected = base.avg_count(State::Latent);
        if expected <= 0.0 || current as f64 - expected <= GAP_LATENT_INCREASE {
            continue;
        }

        let change = percent_change(current as f64, expected);
        let severity = match change {
            Some(pct) if pct >= 100.0 => Severity::High,
            _ => Severity::Medium,
        };

        out.push(Insight {
            topic_id: ts.topic_id,
            subtopic_id: None,
            severity,
            current_value: current as f64,
            baseline_value: expected,
            change_percent: change,
            detail: InsightDetail::Gap {
                current_latent: current,
                baseline_latent: expected,
            },
        });
    }
    out
}

use crate::constants::{EPSILON, IMBALANCE_SHARE, IMBALANCE_SHARE_HIGH};
use crate::insight::{Insight, InsightDetail, Severity};
use crate::snapshot::Snapshot;
use crate::state::State;

/// A single engaged child holding too much of its parent's evidence.
///
/// Needs at least two children: a lone child always holds 100%.
pub fn detect(snapshot: &Snapshot) -> Vec<Insight> {
    let mut out = Vec::new();
    for ts in &snapshot.topics {
        if ts.children.len() < 2 || ts.total_evidence <= EPSILON {
            continue;
        }
        for child in &ts.children {
            let share = child.evidence / ts.total_evidence;
            if share <= IMBALANCE_SHARE || child.state < State::Engaged {
                continue;
            }
            let severity = if share > IMBALANCE_SHARE_HIGH {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(Insight {
                topic_id: ts.topic_id,
                subtopic_id: Some(child.id),
                severity,
                current_value: child.evidence,
                baseline_value: ts.total_evidence,
                change_percent: None,
                detail: InsightDetail::Imbalance {
                    share,
                    child_state: child.state,
                },
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::fixtures::snapshot;

    #[test]
    fn test_41_percent_engaged_is_medium() {
        let snap = snapshot(&[4.1, 2.0, 2.0, 1.9]);
        let found = detect(&snap);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].subtopic_id, Some(snap.topics[0].children[0].id));
    }

    #[test]
    fn test_61_percent_is_high() {
        let snap = snapshot(&[6.1, 1.3, 1.3, 1.3]);
        let found = detect(&snap);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::High);
    }

    #[test]
    fn test_dominant_share_below_engaged_is_ignored() {
        // 2.5 of 4.0 is 62.5% but only Discovered
        let snap = snapshot(&[2.5, 0.5, 0.5, 0.5]);
        assert!(detect(&snap).is_empty());
    }

    #[test]
    fn test_exactly_40_percent_is_not_imbalanced() {
        let snap = snapshot(&[4.0, 3.0, 3.0]);
        assert!(detect(&snap).is_empty());
    }

    #[test]
    fn test_single_child_and_empty_topic() {
        assert!(detect(&snapshot(&[9.0])).is_empty());
        assert!(detect(&snapshot(&[0.0, 0.0])).is_empty());
    }
}

//! Bucket-crossing updates for a topic's position vector.
//!
//! Crossings are instant: when evidence lands in a different bucket the whole
//! mass moves there in one step. Smoothing for display is left to callers.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::EngagementEvent;
use crate::evidence::{accumulate, check_evidence, decayed_evidence};
use crate::state::State;
use crate::time::Timestamp;
use crate::topic::Topic;
use crate::vector::PositionVector;

/// Outcome of one evidence update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub new_vector: PositionVector,
    pub transition_occurred: bool,
    pub old_dominant_state: State,
    pub new_dominant_state: State,
    pub evidence_before: f64,
    pub evidence_after: f64,
}

/// Recompute the position vector for an evidence change.
pub fn transition(
    vector: PositionVector,
    evidence_before: f64,
    evidence_after: f64,
) -> Result<TransitionResult> {
    vector.check()?;
    check_evidence(evidence_after)?;

    let old_bucket = State::classify(evidence_before);
    let new_bucket = State::classify(evidence_after);

    let new_vector = if old_bucket == new_bucket {
        vector
    } else {
        PositionVector::at(new_bucket)
    };
    new_vector.check()?;

    Ok(TransitionResult {
        new_vector,
        transition_occurred: old_bucket != new_bucket,
        old_dominant_state: vector.dominant(),
        new_dominant_state: new_vector.dominant(),
        evidence_before,
        evidence_after,
    })
}

/// Apply one engagement event to a topic: decay, add, reposition.
///
/// The topic is left untouched if any check fails.
pub fn apply_event(
    topic: &mut Topic,
    event: &EngagementEvent,
    now: Timestamp,
) -> Result<TransitionResult> {
    let after = accumulate(topic.evidence, topic.last_updated_at, event, now)?;
    let result = transition(topic.position, topic.evidence, after)?;
    commit(topic, &result, now);
    Ok(result)
}

/// Decay a topic to `now` without a new event. Decay can move a topic
/// backward, e.g. Saturated to Engaged.
pub fn decay_topic(topic: &mut Topic, now: Timestamp) -> Result<TransitionResult> {
    check_evidence(topic.evidence)?;
    let after = decayed_evidence(topic.evidence, topic.last_updated_at, now);
    let result = transition(topic.position, topic.evidence, after)?;
    commit(topic, &result, now);
    Ok(result)
}

fn commit(topic: &mut Topic, result: &TransitionResult, now: Timestamp) {
    topic.evidence = result.evidence_after;
    topic.position = result.new_vector;
    if now > topic.last_updated_at {
        topic.last_updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TOTAL_MASS;
    use crate::event::WeightTier;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn topic() -> Topic {
        Topic::new("u1", "rust", None, t0())
    }

    fn event(tier: WeightTier, at: Timestamp) -> EngagementEvent {
        EngagementEvent::new(topic().id, tier, 1.0, at)
    }

    #[test]
    fn test_first_event_discovers() {
        let mut t = topic();
        let r = apply_event(&mut t, &event(WeightTier::Engaged, t0()), t0()).unwrap();
        assert_relative_eq!(t.evidence, 1.0);
        assert_eq!(t.stored_state(), State::Discovered);
        assert!(r.transition_occurred);
        assert_eq!(r.old_dominant_state, State::Latent);
        assert_eq!(r.new_dominant_state, State::Discovered);
        assert_eq!(t.position.as_array(), [0, TOTAL_MASS, 0, 0]);
        assert_eq!(t.last_updated_at, t0());
    }

    #[test]
    fn test_same_bucket_keeps_vector() {
        let mut t = topic();
        apply_event(&mut t, &event(WeightTier::Engaged, t0()), t0()).unwrap();
        let before = t.position;
        let r = apply_event(&mut t, &event(WeightTier::Ambient, t0()), t0()).unwrap();
        assert!(!r.transition_occurred);
        assert_eq!(r.new_vector, before);
    }

    #[test]
    fn test_decay_moves_backward() {
        let mut t = topic();
        for _ in 0..4 {
            apply_event(&mut t, &event(WeightTier::Committed, t0()), t0()).unwrap();
        }
        assert_eq!(t.position.dominant(), State::Saturated);

        // 8 → 8·e^-0.5 ≈ 4.85 after five days
        let r = decay_topic(&mut t, t0() + Duration::days(5)).unwrap();
        assert!(r.transition_occurred);
        assert_eq!(r.old_dominant_state, State::Saturated);
        assert_eq!(r.new_dominant_state, State::Engaged);
        assert_eq!(t.position, PositionVector::at(State::Engaged));
    }

    #[test]
    fn test_invalid_event_leaves_topic_untouched() {
        let mut t = topic();
        let original = t.clone();
        let bad = EngagementEvent {
            base_weight: -1.0,
            ..event(WeightTier::Engaged, t0())
        };
        assert!(apply_event(&mut t, &bad, t0() + Duration::days(1)).is_err());
        assert_eq!(t, original);
    }

    #[test]
    fn test_decay_without_elapsed_time_is_noop() {
        let mut t = topic();
        apply_event(&mut t, &event(WeightTier::Committed, t0()), t0()).unwrap();
        let r = decay_topic(&mut t, t0()).unwrap();
        assert!(!r.transition_occurred);
        assert_relative_eq!(t.evidence, 2.0);
    }

    #[test]
    fn test_mass_conserved_over_long_run() {
        let mut t = topic();
        let mut now = t0();
        for i in 0..200 {
            now += Duration::hours(7);
            let tier = match i % 3 {
                0 => WeightTier::Ambient,
                1 => WeightTier::Engaged,
                _ => WeightTier::Committed,
            };
            let r = if i % 5 == 0 {
                decay_topic(&mut t, now + Duration::days(3)).unwrap()
            } else {
                apply_event(&mut t, &event(tier, now), now).unwrap()
            };
            assert_eq!(r.new_vector.as_array().iter().sum::<u32>(), TOTAL_MASS);
            assert_eq!(r.new_dominant_state, State::classify(t.evidence));
        }
    }
}

//! Evidence accumulation: lazy exponential decay plus per-event contribution.
//!
//! ```text
//! decayed  = evidence × e^(−λ·Δdays)
//! contrib  = base_weight × relevance × reading_depth
//! evidence' = decayed(evidence, last_updated_at, now) + contrib
//! ```

use crate::constants::DECAY_LAMBDA;
use crate::error::{CoreError, Result};
use crate::event::EngagementEvent;
use crate::time::{Timestamp, elapsed_days};

/// Evidence decayed from `last_updated_at` to `now`. A `now` before
/// `last_updated_at` counts as zero elapsed time.
pub fn decayed_evidence(evidence: f64, last_updated_at: Timestamp, now: Timestamp) -> f64 {
    let days = elapsed_days(last_updated_at, now);
    evidence * (-DECAY_LAMBDA * days).exp()
}

/// Evidence mass one event adds at the moment it happens.
pub fn contribution(event: &EngagementEvent) -> f64 {
    event.base_weight * event.relevance * event.reading_depth
}

/// Rebuild evidence from an event history, each contribution decayed from
/// its own timestamp to `now`.
pub fn evidence_from_events<'a>(
    events: impl IntoIterator<Item = &'a EngagementEvent>,
    now: Timestamp,
) -> f64 {
    events
        .into_iter()
        .map(|e| decayed_evidence(contribution(e), e.timestamp, now))
        .sum()
}

/// Decay-then-add for one event. Returns the new evidence value.
pub fn accumulate(
    evidence: f64,
    last_updated_at: Timestamp,
    event: &EngagementEvent,
    now: Timestamp,
) -> Result<f64> {
    event.validate()?;
    check_evidence(evidence)?;
    let next = decayed_evidence(evidence, last_updated_at, now) + contribution(event);
    check_evidence(next)?;
    Ok(next)
}

/// Evidence must be a finite, non-negative number.
pub fn check_evidence(evidence: f64) -> Result<()> {
    if !evidence.is_finite() || evidence < 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "evidence must be finite and non-negative, got {evidence}"
        )));
    }
    Ok(())
}

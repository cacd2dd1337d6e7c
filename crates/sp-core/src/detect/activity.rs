//! Detectors over raw recent events rather than snapshot state.

use std::collections::HashSet;

use chrono::Duration;

use crate::constants::{
    CONSUMPTION_TRAP_MIN_WORDS, CONSUMPTION_TRAP_WINDOW_DAYS, RABBIT_HOLE_MIN_URLS,
    RABBIT_HOLE_WINDOW_MINUTES,
};
use crate::detect::Grouped;
use crate::event::{EngagementEvent, WeightTier};
use crate::insight::{Insight, InsightDetail, Severity};
use crate::time::Timestamp;

fn in_window<'a>(
    events: &'a [&'a EngagementEvent],
    since: Timestamp,
    now: Timestamp,
) -> impl Iterator<Item = &'a EngagementEvent> + 'a {
    events
        .iter()
        .copied()
        .filter(move |e| e.timestamp >= since && e.timestamp <= now)
}

/// Many distinct sources opened under one subtopic within the last hour.
/// Reported as a positive, low-severity signal.
pub fn detect_rabbit_holes(
    grouped: &Grouped<'_>,
    now: Timestamp,
) -> Vec<Insight> {
    let since = now - Duration::minutes(RABBIT_HOLE_WINDOW_MINUTES);
    let mut out = Vec::new();

    for (placement, events) in grouped {
        let (topic_id, subtopic_id) = *placement;
        let recent: Vec<&EngagementEvent> = in_window(events, since, now).collect();
        let urls: HashSet<&str> = recent
            .iter()
            .filter_map(|e| e.source_url.as_deref())
            .collect();
        if urls.len() < RABBIT_HOLE_MIN_URLS {
            continue;
        }

        let first = recent.iter().map(|e| e.timestamp).min().unwrap_or(now);
        let last = recent.iter().map(|e| e.timestamp).max().unwrap_or(now);

        out.push(Insight {
            topic_id,
            subtopic_id,
            severity: Severity::Low,
            current_value: urls.len() as f64,
            baseline_value: 0.0,
            change_percent: None,
            detail: InsightDetail::RabbitHole {
                url_count: urls.len(),
                window_minutes: RABBIT_HOLE_WINDOW_MINUTES,
                span_minutes: (last - first).num_minutes(),
            },
        });
    }
    out
}

/// Lots of reading in the last week without a single committed interaction.
pub fn detect_consumption_traps(
    grouped: &Grouped<'_>,
    now: Timestamp,
) -> Vec<Insight> {
    let since = now - Duration::days(CONSUMPTION_TRAP_WINDOW_DAYS);
    let mut out = Vec::new();

    for (placement, events) in grouped {
        let (topic_id, subtopic_id) = *placement;
        let mut words = 0u64;
        let mut count = 0usize;
        let mut committed = false;
        for e in in_window(events, since, now) {
            words += u64::from(e.word_count);
            count += 1;
            committed |= e.tier() == WeightTier::Committed;
        }
        if committed || words <= CONSUMPTION_TRAP_MIN_WORDS {
            continue;
        }

        out.push(Insight {
            topic_id,
            subtopic_id,
            severity: Severity::Medium,
            current_value: words as f64,
            baseline_value: 0.0,
            change_percent: None,
            detail: InsightDetail::ConsumptionTrap {
                word_count: words,
                window_days: CONSUMPTION_TRAP_WINDOW_DAYS,
                event_count: count,
            },
        });
    }
    out
}

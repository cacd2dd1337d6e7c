//! Point-in-time capture of a user's topic tree.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SNAPSHOT_EVENT_LIMIT;
use crate::error::CoreError;
use crate::event::EngagementEvent;
use crate::evidence::{decayed_evidence, evidence_from_events};
use crate::source::EventSource;
use crate::state::State;
use crate::time::Timestamp;
use crate::topic::{Topic, TopicTree};
use crate::vector::Histogram;

/// Events older than this contribute under e^-9 of their mass and are not read.
pub const SNAPSHOT_LOOKBACK_DAYS: i64 = 90;

/// Cadence of the scheduled run that produced a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    Daily,
    Weekly,
    Monthly,
}

impl SnapshotType {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotType::Daily => "daily",
            SnapshotType::Weekly => "weekly",
            SnapshotType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for SnapshotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "daily" => Ok(SnapshotType::Daily),
            "weekly" => Ok(SnapshotType::Weekly),
            "monthly" => Ok(SnapshotType::Monthly),
            other => Err(CoreError::InvalidInput(format!("unknown snapshot type '{other}'"))),
        }
    }
}

/// One subtopic as seen at snapshot time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildState {
    pub id: Uuid,
    pub name: String,
    pub evidence: f64,
    pub state: State,
}

/// One root topic and its children as seen at snapshot time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicSnapshot {
    pub topic_id: Uuid,
    pub name: String,
    pub histogram: Histogram,
    pub children: Vec<ChildState>,
    pub total_evidence: f64,
    pub events_per_day: f64,
}

impl TopicSnapshot {
    pub fn child(&self, id: Uuid) -> Option<&ChildState> {
        self.children.iter().find(|c| c.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub user_id: String,
    pub taken_at: Timestamp,
    pub snapshot_type: SnapshotType,
    pub topics: Vec<TopicSnapshot>,
}

impl Snapshot {
    pub fn topic(&self, id: Uuid) -> Option<&TopicSnapshot> {
        self.topics.iter().find(|t| t.topic_id == id)
    }
}

/// Options for [`build_snapshot`].
#[derive(Clone, Copy, Debug)]
pub struct SnapshotOptions {
    pub snapshot_type: SnapshotType,
    /// Most recent events read per child.
    pub event_limit: usize,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            snapshot_type: SnapshotType::Daily,
            event_limit: SNAPSHOT_EVENT_LIMIT,
        }
    }
}

/// Capture every tree a user owns.
///
/// Each child's evidence is rebuilt from its most recent events, decayed to
/// `now`. A child with no recorded events falls back to its stored evidence,
/// decayed the same way. A root without children reports its own evidence.
pub fn build_snapshot<S: EventSource>(
    user_id: &str,
    trees: &[TopicTree],
    source: &S,
    now: Timestamp,
    options: SnapshotOptions,
) -> Result<Snapshot, S::Error> {
    let mut topics = Vec::with_capacity(trees.len());
    for tree in trees {
        topics.push(build_topic_snapshot(tree, source, now, options.event_limit)?);
    }

    Ok(Snapshot {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        taken_at: now,
        snapshot_type: options.snapshot_type,
        topics,
    })
}

fn build_topic_snapshot<S: EventSource>(
    tree: &TopicTree,
    source: &S,
    now: Timestamp,
    limit: usize,
) -> Result<TopicSnapshot, S::Error> {
    let day_ago = now - Duration::days(1);

    if tree.children.is_empty() {
        let events = read_events(source, &tree.root, now, limit)?;
        let evidence = current_evidence(&tree.root, &events, now);
        let today = events.iter().filter(|e| e.timestamp > day_ago).count();
        return Ok(TopicSnapshot {
            topic_id: tree.root.id,
            name: tree.root.name.clone(),
            histogram: Histogram::default(),
            children: Vec::new(),
            total_evidence: evidence,
            events_per_day: today as f64,
        });
    }

    let mut children = Vec::with_capacity(tree.children.len());
    let mut today = 0usize;
    for child in &tree.children {
        let events = read_events(source, child, now, limit)?;
        today += events.iter().filter(|e| e.timestamp > day_ago).count();
        let evidence = current_evidence(child, &events, now);
        children.push(ChildState {
            id: child.id,
            name: child.name.clone(),
            evidence,
            state: State::classify(evidence),
        });
    }

    let histogram = Histogram::from_states(children.iter().map(|c| c.state));
    histogram.check(children.len())?;
    let total_evidence = children.iter().map(|c| c.evidence).sum();

    Ok(TopicSnapshot {
        topic_id: tree.root.id,
        name: tree.root.name.clone(),
        histogram,
        children,
        total_evidence,
        events_per_day: today as f64,
    })
}

fn read_events<S: EventSource>(
    source: &S,
    topic: &Topic,
    now: Timestamp,
    limit: usize,
) -> Result<Vec<EngagementEvent>, S::Error> {
    let since = now - Duration::days(SNAPSHOT_LOOKBACK_DAYS);
    let mut events = source.recent_events(topic.id, since, limit)?;
    events.retain(|e| e.timestamp <= now);
    Ok(events)
}

fn current_evidence(topic: &Topic, events: &[EngagementEvent], now: Timestamp) -> f64 {
    if events.is_empty() {
        decayed_evidence(topic.evidence, topic.last_updated_at, now)
    } else {
        evidence_from_events(events, now)
    }
}

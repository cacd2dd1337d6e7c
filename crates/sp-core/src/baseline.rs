//! Baselines: arithmetic means over a window of snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::snapshot::Snapshot;
use crate::state::State;

/// Report horizon. Longer horizons average over wider windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ReportPeriod {
    /// Number of snapshots averaged into the baseline.
    pub fn window(self) -> usize {
        match self {
            ReportPeriod::Daily => 7,
            ReportPeriod::Weekly => 30,
            ReportPeriod::Monthly => 90,
            ReportPeriod::Yearly => 365,
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

impl FromStr for ReportPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "daily" => Ok(ReportPeriod::Daily),
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            "yearly" => Ok(ReportPeriod::Yearly),
            other => Err(CoreError::InvalidInput(format!("unknown report period '{other}'"))),
        }
    }
}

/// Expected values for one root topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicBaseline {
    pub avg_histogram: [f64; 4],
    pub avg_evidence: f64,
    pub avg_events_per_day: f64,
    /// Snapshots the topic appeared in.
    pub samples: usize,
}

impl TopicBaseline {
    pub fn avg_count(&self, state: State) -> f64 {
        self.avg_histogram[state.index()]
    }
}

/// Averages over a snapshot window, keyed by topic id. Child subtopics get
/// their own average evidence keyed by the child id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub topics: HashMap<Uuid, TopicBaseline>,
    pub children: HashMap<Uuid, f64>,
    /// Number of snapshots in the window.
    pub window: usize,
}

impl Baseline {
    pub fn topic(&self, id: Uuid) -> Option<&TopicBaseline> {
        self.topics.get(&id)
    }

    pub fn child_evidence(&self, id: Uuid) -> Option<f64> {
        self.children.get(&id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[derive(Default)]
struct Accum {
    histogram: [f64; 4],
    evidence: f64,
    events_per_day: f64,
    samples: usize,
}

/// Mean per topic across all `snapshots`. A topic only averages over the
/// snapshots it appears in, so newly created topics are not dragged toward
/// zero by older snapshots that predate them.
pub fn compute_baseline(snapshots: &[Snapshot]) -> Baseline {
    let mut topics: HashMap<Uuid, Accum> = HashMap::new();
    let mut children: HashMap<Uuid, (f64, usize)> = HashMap::new();

    for snap in snapshots {
        for ts in &snap.topics {
            let acc = topics.entry(ts.topic_id).or_default();
            for (slot, count) in acc.histogram.iter_mut().zip(ts.histogram.as_array()) {
                *slot += count as f64;
            }
            acc.evidence += ts.total_evidence;
            acc.events_per_day += ts.events_per_day;
            acc.samples += 1;

            for child in &ts.children {
                let entry = children.entry(child.id).or_insert((0.0, 0));
                entry.0 += child.evidence;
                entry.1 += 1;
            }
        }
    }

    let topics = topics
        .into_iter()
        .map(|(id, acc)| {
            let n = acc.samples as f64;
            (
                id,
                TopicBaseline {
                    avg_histogram: acc.histogram.map(|v| v / n),
                    avg_evidence: acc.evidence / n,
                    avg_events_per_day: acc.events_per_day / n,
                    samples: acc.samples,
                },
            )
        })
        .collect();

    let children = children
        .into_iter()
        .map(|(id, (sum, n))| (id, sum / n as f64))
        .collect();

    Baseline {
        topics,
        children,
        window: snapshots.len(),
    }
}

/// Baseline over the most recent `period.window()` snapshots. Input may be in
/// any order.
pub fn baseline_for_period(snapshots: &[Snapshot], period: ReportPeriod) -> Baseline {
    let mut recent: Vec<&Snapshot> = snapshots.iter().collect();
    recent.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
    recent.truncate(period.window());
    let window: Vec<Snapshot> = recent.into_iter().cloned().collect();
    compute_baseline(&window)
}

//! Attention-tracking engine.
//!
//! Tracks how engaged a user is with each topic in a two-level tree.
//! Engagement events add decaying evidence; evidence maps onto four states
//! (Latent, Discovered, Engaged, Saturated) held as a fixed-mass position
//! vector. Periodic snapshots record the distribution of child states per
//! root topic, rolling baselines average them, and a set of detectors
//! compares the two to surface insights.
//!
//! Zero I/O. Storage is reached only through the traits in [`source`].

pub mod baseline;
pub mod constants;
pub mod detect;
pub mod error;
pub mod event;
pub mod evidence;
pub mod insight;
pub mod retention;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod time;
pub mod topic;
pub mod transition;
pub mod vector;

pub use baseline::{Baseline, ReportPeriod, TopicBaseline, baseline_for_period, compute_baseline};
pub use constants::{
    DECAY_LAMBDA, THETA_DISCOVERED, THETA_ENGAGED, THETA_SATURATED, TOTAL_MASS,
};
pub use detect::{
    DetectionInput, DetectionPass, DetectionReport, DropReason, DroppedCandidate,
    StabilityCandidate, StabilityConfig, confirm_candidates, detect_candidates, detect_insights,
};
pub use error::{CoreError, Result};
pub use event::{EngagementEvent, WeightTier};
pub use evidence::{accumulate, contribution, decayed_evidence, evidence_from_events};
pub use insight::{DriftDirection, Insight, InsightDetail, InsightKind, Severity};
pub use retention::{
    RetentionOutcome, RetentionPlan, RetentionPolicy, SnapshotMeta, apply_retention_policy,
};
pub use snapshot::{
    ChildState, Snapshot, SnapshotOptions, SnapshotType, TopicSnapshot, build_snapshot,
};
pub use source::{EnrichmentSource, EventSource, SnapshotSink, SnapshotSource};
pub use state::State;
pub use time::Timestamp;
pub use topic::{Topic, TopicTree};
pub use transition::{TransitionResult, apply_event, decay_topic, transition};
pub use vector::{Histogram, PositionVector};

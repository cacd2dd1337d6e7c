//! Data-access seams. The engine owns no storage; callers implement these
//! against whatever holds their events and snapshots.

use uuid::Uuid;

use crate::error::CoreError;
use crate::event::EngagementEvent;
use crate::snapshot::{Snapshot, SnapshotType};
use crate::time::Timestamp;

/// Read access to raw engagement events.
pub trait EventSource {
    type Error: From<CoreError> + std::fmt::Display;

    /// Events for `topic_id` at or after `since`, newest first, at most `limit`.
    fn recent_events(
        &self,
        topic_id: Uuid,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<EngagementEvent>, Self::Error>;
}

/// Read access to stored snapshots.
pub trait SnapshotSource {
    type Error: From<CoreError> + std::fmt::Display;

    /// Snapshots for `user_id` taken within the last `window_days` of `now`,
    /// newest first, optionally filtered by cadence. `None` window reads all.
    fn snapshots(
        &self,
        user_id: &str,
        now: Timestamp,
        window_days: Option<u32>,
        snapshot_type: Option<SnapshotType>,
    ) -> Result<Vec<Snapshot>, Self::Error>;
}

/// Write access to stored snapshots.
pub trait SnapshotSink {
    type Error: From<CoreError> + std::fmt::Display;

    fn persist_snapshot(&self, user_id: &str, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Delete all `ids` in one batch. Returns the number of rows removed.
    fn delete_snapshots(&self, ids: &[Uuid]) -> Result<usize, Self::Error>;
}

/// Raw-history lookups used to confirm stability candidates.
///
/// Implementations report any failure, including timeouts, as
/// [`CoreError::EnrichmentUnavailable`]; the confirmation pass drops the
/// affected candidate instead of failing the run.
pub trait EnrichmentSource {
    /// Events recorded for `subtopic_id` at or after `since`.
    fn window_events(
        &self,
        subtopic_id: Uuid,
        since: Timestamp,
    ) -> crate::error::Result<Vec<EngagementEvent>>;
}

impl<F> EnrichmentSource for F
where
    F: Fn(Uuid, Timestamp) -> crate::error::Result<Vec<EngagementEvent>>,
{
    fn window_events(
        &self,
        subtopic_id: Uuid,
        since: Timestamp,
    ) -> crate::error::Result<Vec<EngagementEvent>> {
        self(subtopic_id, since)
    }
}

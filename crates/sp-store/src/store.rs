use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;
use uuid::Uuid;

use sp_core::{
    CoreError, EngagementEvent, EventSource, PositionVector, Snapshot, SnapshotSink,
    SnapshotSource, SnapshotType, Timestamp, Topic, TopicTree, TransitionResult, apply_event,
    decay_topic,
};

use crate::error::{Result, StoreError};
use crate::schema;

const TOPIC_COLUMNS: &str = "id, user_id, parent_id, name, evidence, last_updated_at, \
     pos_latent, pos_discovered, pos_engaged, pos_saturated";

const EVENT_COLUMNS: &str =
    "id, topic_id, base_weight, relevance, reading_depth, source_url, word_count, occurred_at";

pub struct Store {
    conn: Connection,
}

/// Row counts for one user.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub schema_version: Option<i64>,
    pub topics: usize,
    pub root_topics: usize,
    pub events: usize,
    pub snapshots: usize,
    pub oldest_snapshot: Option<Timestamp>,
    pub newest_snapshot: Option<Timestamp>,
}

/// Result of decaying every topic a user owns.
#[derive(Clone, Debug, Default)]
pub struct DecayOutcome {
    pub topics: usize,
    pub transitions: Vec<(Topic, TransitionResult)>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::info!(path = %path.display(), "store opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Topics ---

    /// Create a root topic, or a subtopic when `parent_id` names a root topic
    /// of the same user. Trees are two levels deep.
    pub fn create_topic(
        &self,
        user_id: &str,
        name: &str,
        parent_id: Option<Uuid>,
        now: Timestamp,
    ) -> Result<Topic> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidInput("topic name must not be empty".into()).into());
        }
        if let Some(pid) = parent_id {
            let parent = self.get_topic(pid)?.ok_or_else(|| {
                CoreError::InvalidInput(format!("parent topic not found: {pid}"))
            })?;
            if parent.user_id != user_id {
                return Err(CoreError::InvalidInput(format!(
                    "parent topic {pid} belongs to another user"
                ))
                .into());
            }
            if !parent.is_root() {
                return Err(CoreError::InvalidInput(format!(
                    "parent topic {pid} is itself a subtopic"
                ))
                .into());
            }
        }

        let topic = Topic::new(user_id, name, parent_id, now);
        let [latent, discovered, engaged, saturated] = topic.position.as_array();
        self.conn.execute(
            &format!(
                "INSERT INTO topics ({TOPIC_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                topic.id.to_string(),
                topic.user_id,
                topic.parent_id.map(|p| p.to_string()),
                topic.name,
                topic.evidence,
                ts_to_sql(topic.last_updated_at),
                latent,
                discovered,
                engaged,
                saturated,
            ],
        )?;
        tracing::debug!(topic = %topic.id, name, "topic created");
        Ok(topic)
    }

    pub fn get_topic(&self, id: Uuid) -> Result<Option<Topic>> {
        load_topic(&self.conn, id)
    }

    /// Look a topic up by id, or by exact name within the user's topics.
    /// A name shared by several topics is rejected as ambiguous.
    pub fn find_topic(&self, user_id: &str, id_or_name: &str) -> Result<Option<Topic>> {
        if let Ok(id) = Uuid::parse_str(id_or_name) {
            return Ok(self.get_topic(id)?.filter(|t| t.user_id == user_id));
        }
        let mut matches: Vec<Topic> = self
            .list_topics(user_id)?
            .into_iter()
            .filter(|t| t.name == id_or_name)
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(CoreError::InvalidInput(format!(
                "topic name '{id_or_name}' is ambiguous ({n} matches); use its id"
            ))
            .into()),
        }
    }

    /// Every topic the user owns, in creation order.
    pub fn list_topics(&self, user_id: &str) -> Result<Vec<Topic>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE user_id = ?1 ORDER BY rowid"
        ))?;
        let rows: Vec<TopicRow> = stmt
            .query_map([user_id], TopicRow::from_row)?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter().map(TopicRow::into_topic).collect()
    }

    pub fn topic_trees(&self, user_id: &str) -> Result<Vec<TopicTree>> {
        Ok(TopicTree::from_topics(self.list_topics(user_id)?))
    }

    // --- Events ---

    /// Persist `event` and fold it into its topic's evidence and position.
    ///
    /// Read, decay, add and write happen inside one IMMEDIATE transaction, so
    /// concurrent writers to the same database serialize. On any failure
    /// nothing is written.
    pub fn record_event(&self, event: &EngagementEvent, now: Timestamp) -> Result<TransitionResult> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let mut topic = load_topic(&tx, event.topic_id)?.ok_or_else(|| {
            CoreError::InvalidInput(format!("topic not found: {}", event.topic_id))
        })?;
        let result = apply_event(&mut topic, event, now)?;

        tx.execute(
            &format!("INSERT INTO events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                event.id.to_string(),
                event.topic_id.to_string(),
                event.base_weight,
                event.relevance,
                event.reading_depth,
                event.source_url,
                event.word_count,
                ts_to_sql(event.timestamp),
            ],
        )?;
        write_topic(&tx, &topic)?;
        tx.commit()?;

        tracing::debug!(
            topic = %topic.id,
            evidence = result.evidence_after,
            transition = result.transition_occurred,
            "event recorded"
        );
        Ok(result)
    }

    /// Events on `topic_id` at or after `since`, newest first.
    pub fn recent_events(
        &self,
        topic_id: Uuid,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<EngagementEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE topic_id = ?1 AND occurred_at >= ?2
             ORDER BY occurred_at DESC LIMIT ?3"
        ))?;
        let rows: Vec<EventRow> = stmt
            .query_map(
                params![topic_id.to_string(), ts_to_sql(since), limit],
                EventRow::from_row,
            )?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// Every event on any of the user's topics in `[since, until]`, oldest first.
    pub fn events_between(
        &self,
        user_id: &str,
        since: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<EngagementEvent>> {
        let columns = EVENT_COLUMNS
            .split(", ")
            .map(|c| format!("e.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM events e JOIN topics t ON t.id = e.topic_id
             WHERE t.user_id = ?1 AND e.occurred_at >= ?2 AND e.occurred_at <= ?3
             ORDER BY e.occurred_at"
        ))?;
        let rows: Vec<EventRow> = stmt
            .query_map(
                params![user_id, ts_to_sql(since), ts_to_sql(until)],
                EventRow::from_row,
            )?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter().map(EventRow::into_event).collect()
    }

    // --- Decay ---

    /// Decay every topic of `user_id` to `now`, one transaction per topic.
    pub fn decay_all(&self, user_id: &str, now: Timestamp) -> Result<DecayOutcome> {
        let ids: Vec<Uuid> = self.list_topics(user_id)?.iter().map(|t| t.id).collect();
        let mut outcome = DecayOutcome::default();

        for id in ids {
            let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
            let Some(mut topic) = load_topic(&tx, id)? else {
                continue;
            };
            let result = decay_topic(&mut topic, now)?;
            write_topic(&tx, &topic)?;
            tx.commit()?;

            outcome.topics += 1;
            if result.transition_occurred {
                tracing::debug!(
                    topic = %topic.id,
                    from = %result.old_dominant_state,
                    to = %result.new_dominant_state,
                    "decay moved topic"
                );
                outcome.transitions.push((topic, result));
            }
        }
        tracing::info!(
            user = user_id,
            topics = outcome.topics,
            transitions = outcome.transitions.len(),
            "decay complete"
        );
        Ok(outcome)
    }

    // --- Snapshots ---

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO snapshots (id, user_id, taken_at, snapshot_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.id.to_string(),
                snapshot.user_id,
                ts_to_sql(snapshot.taken_at),
                snapshot.snapshot_type.as_str(),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Snapshots for `user_id`, newest first. `window_days` counts back from
    /// `now`; `None` reads the full history.
    pub fn load_snapshots(
        &self,
        user_id: &str,
        now: Timestamp,
        window_days: Option<u32>,
        snapshot_type: Option<SnapshotType>,
    ) -> Result<Vec<Snapshot>> {
        let since = window_days
            .map(|d| ts_to_sql(now - chrono::Duration::days(i64::from(d))))
            .unwrap_or_default();
        let kind = snapshot_type.map(SnapshotType::as_str);

        let mut stmt = self.conn.prepare(
            "SELECT payload FROM snapshots
             WHERE user_id = ?1 AND taken_at >= ?2 AND (?3 IS NULL OR snapshot_type = ?3)
             ORDER BY taken_at DESC",
        )?;
        let payloads: Vec<String> = stmt
            .query_map(params![user_id, since, kind], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }

    /// Delete all `ids` in one transaction. Returns rows removed.
    pub fn delete_snapshot_batch(&self, ids: &[Uuid]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM snapshots WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute([id.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    // --- Stats ---

    pub fn stats(&self, user_id: &str) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [user_id], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };
        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(taken_at), MAX(taken_at) FROM snapshots WHERE user_id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            schema_version: schema::get_schema_version(&self.conn)?,
            topics: count("SELECT COUNT(*) FROM topics WHERE user_id = ?1")?,
            root_topics: count(
                "SELECT COUNT(*) FROM topics WHERE user_id = ?1 AND parent_id IS NULL",
            )?,
            events: count(
                "SELECT COUNT(*) FROM events e JOIN topics t ON t.id = e.topic_id
                 WHERE t.user_id = ?1",
            )?,
            snapshots: count("SELECT COUNT(*) FROM snapshots WHERE user_id = ?1")?,
            oldest_snapshot: oldest.as_deref().map(parse_ts).transpose()?,
            newest_snapshot: newest.as_deref().map(parse_ts).transpose()?,
        })
    }
}

impl EventSource for Store {
    type Error = StoreError;

    fn recent_events(
        &self,
        topic_id: Uuid,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<EngagementEvent>> {
        Store::recent_events(self, topic_id, since, limit)
    }
}

impl SnapshotSource for Store {
    type Error = StoreError;

    fn snapshots(
        &self,
        user_id: &str,
        now: Timestamp,
        window_days: Option<u32>,
        snapshot_type: Option<SnapshotType>,
    ) -> Result<Vec<Snapshot>> {
        self.load_snapshots(user_id, now, window_days, snapshot_type)
    }
}

impl SnapshotSink for Store {
    type Error = StoreError;

    fn persist_snapshot(&self, user_id: &str, snapshot: &Snapshot) -> Result<()> {
        if snapshot.user_id != user_id {
            return Err(CoreError::InvalidInput(format!(
                "snapshot belongs to '{}', not '{user_id}'",
                snapshot.user_id
            ))
            .into());
        }
        self.save_snapshot(snapshot)
    }

    fn delete_snapshots(&self, ids: &[Uuid]) -> Result<usize> {
        self.delete_snapshot_batch(ids)
    }
}

// --- Row mapping ---

/// Fixed-width UTC rendering, so stored timestamps order lexicographically.
fn ts_to_sql(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp '{s}': {e}")))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}

fn load_topic(conn: &Connection, id: Uuid) -> Result<Option<Topic>> {
    let row = conn
        .query_row(
            &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
            [id.to_string()],
            TopicRow::from_row,
        )
        .optional()?;
    row.map(TopicRow::into_topic).transpose()
}

fn write_topic(conn: &Connection, topic: &Topic) -> Result<()> {
    topic.position.check()?;
    let [latent, discovered, engaged, saturated] = topic.position.as_array();
    conn.execute(
        "UPDATE topics SET evidence = ?1, last_updated_at = ?2,
             pos_latent = ?3, pos_discovered = ?4, pos_engaged = ?5, pos_saturated = ?6
         WHERE id = ?7",
        params![
            topic.evidence,
            ts_to_sql(topic.last_updated_at),
            latent,
            discovered,
            engaged,
            saturated,
            topic.id.to_string(),
        ],
    )?;
    Ok(())
}

struct TopicRow {
    id: String,
    user_id: String,
    parent_id: Option<String>,
    name: String,
    evidence: f64,
    last_updated_at: String,
    position: [u32; 4],
}

impl TopicRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            parent_id: row.get(2)?,
            name: row.get(3)?,
            evidence: row.get(4)?,
            last_updated_at: row.get(5)?,
            position: [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?],
        })
    }

    fn into_topic(self) -> Result<Topic> {
        Ok(Topic {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            parent_id: self.parent_id.as_deref().map(parse_uuid).transpose()?,
            name: self.name,
            evidence: self.evidence,
            last_updated_at: parse_ts(&self.last_updated_at)?,
            position: PositionVector::from_array(self.position)?,
        })
    }
}

struct EventRow {
    id: String,
    topic_id: String,
    base_weight: f64,
    relevance: f64,
    reading_depth: f64,
    source_url: Option<String>,
    word_count: u32,
    occurred_at: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            topic_id: row.get(1)?,
            base_weight: row.get(2)?,
            relevance: row.get(3)?,
            reading_depth: row.get(4)?,
            source_url: row.get(5)?,
            word_count: row.get(6)?,
            occurred_at: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<EngagementEvent> {
        Ok(EngagementEvent {
            id: parse_uuid(&self.id)?,
            topic_id: parse_uuid(&self.topic_id)?,
            base_weight: self.base_weight,
            relevance: self.relevance,
            reading_depth: self.reading_depth,
            timestamp: parse_ts(&self.occurred_at)?,
            source_url: self.source_url,
            word_count: self.word_count,
        })
    }
}

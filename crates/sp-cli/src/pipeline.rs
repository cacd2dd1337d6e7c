//! Batch steps shared by the subcommands: snapshot, insights, retention.
//!
//! The store sits behind an async mutex so enrichment queries can run on the
//! blocking pool under a timeout while the detection pass stays synchronous.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use sp_core::insight::rank;
use sp_core::{
    Baseline, CoreError, DetectionInput, DetectionReport, EngagementEvent, ReportPeriod,
    RetentionOutcome, RetentionPolicy, Snapshot, SnapshotOptions, SnapshotSink, SnapshotSource,
    SnapshotType, StabilityCandidate, StabilityConfig, Timestamp, apply_retention_policy,
    baseline_for_period, build_snapshot, confirm_candidates, detect_candidates,
};
use sp_store::{Config, Store};

/// Longest raw-history window any pure detector reads.
const RECENT_EVENT_DAYS: i64 = 7;

/// One user's batch context.
pub struct Job {
    pub store: Arc<Mutex<Store>>,
    pub user: String,
    pub now: Timestamp,
    pub config: Config,
}

/// Output of an insight run.
#[derive(Debug, Serialize)]
pub struct InsightRun {
    pub snapshot: Snapshot,
    pub baseline: Baseline,
    pub insights: Vec<sp_core::Insight>,
    pub dropped: usize,
}

impl Job {
    pub fn new(store: Store, user: String, now: Timestamp, config: Config) -> Result<Self> {
        config.validate().context("invalid job configuration")?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            user,
            now,
            config,
        })
    }

    fn stability_config(&self) -> StabilityConfig {
        StabilityConfig {
            window_days: self.config.enrichment_window_days,
            ..StabilityConfig::default()
        }
    }

    /// Build and persist a snapshot of every tree the user owns.
    pub async fn take_snapshot(&self, snapshot_type: SnapshotType) -> Result<Snapshot> {
        let store = self.store.lock().await;
        let trees = store
            .topic_trees(&self.user)
            .context("failed to load topics")?;
        let options = SnapshotOptions {
            snapshot_type,
            event_limit: self.config.snapshot_event_limit,
        };
        let snapshot = build_snapshot(&self.user, &trees, &*store, self.now, options)
            .context("failed to build snapshot")?;
        store
            .persist_snapshot(&self.user, &snapshot)
            .context("failed to persist snapshot")?;

        tracing::info!(
            user = %self.user,
            topics = snapshot.topics.len(),
            kind = %snapshot_type,
            "snapshot taken"
        );
        Ok(snapshot)
    }

    /// Baseline over stored snapshots taken before `before`, excluding `skip`.
    pub async fn baseline(
        &self,
        period: ReportPeriod,
        before: Timestamp,
        skip: Option<Uuid>,
    ) -> Result<Baseline> {
        let store = self.store.lock().await;
        let window = u32::try_from(period.window()).unwrap_or(u32::MAX);
        let mut history = store
            .snapshots(&self.user, before, Some(window), None)
            .context("failed to load snapshots")?;
        history.retain(|s| Some(s.id) != skip && s.taken_at <= before);
        Ok(baseline_for_period(&history, period))
    }

    /// Latest stored snapshot at or before `now`, or a fresh unpersisted one.
    async fn current_snapshot(&self) -> Result<Snapshot> {
        let store = self.store.lock().await;
        let latest = store
            .snapshots(&self.user, self.now, None, None)
            .context("failed to load snapshots")?
            .into_iter()
            .find(|s| s.taken_at <= self.now);
        if let Some(snapshot) = latest {
            return Ok(snapshot);
        }

        let trees = store
            .topic_trees(&self.user)
            .context("failed to load topics")?;
        let options = SnapshotOptions {
            event_limit: self.config.snapshot_event_limit,
            ..SnapshotOptions::default()
        };
        build_snapshot(&self.user, &trees, &*store, self.now, options)
            .context("failed to build snapshot")
    }

    /// Detect insights for `current` (or the latest snapshot) against the
    /// period baseline. Stability candidates are confirmed through
    /// timeout-bounded queries; a failed query drops only its candidate.
    pub async fn generate_insights(
        &self,
        period: ReportPeriod,
        current: Option<Snapshot>,
    ) -> Result<InsightRun> {
        let snapshot = match current {
            Some(s) => s,
            None => self.current_snapshot().await?,
        };
        let baseline = self
            .baseline(period, snapshot.taken_at, Some(snapshot.id))
            .await?;

        let recent_events = {
            let store = self.store.lock().await;
            store
                .events_between(
                    &self.user,
                    self.now - chrono::Duration::days(RECENT_EVENT_DAYS),
                    self.now,
                )
                .context("failed to load recent events")?
        };

        let input = DetectionInput {
            snapshot: &snapshot,
            baseline: &baseline,
            recent_events: &recent_events,
            now: self.now,
        };
        let pass = detect_candidates(&input);

        let config = self.stability_config();
        let since = self.now - chrono::Duration::days(config.window_days);
        let windows = self.enrich(&pass.candidates, since).await;
        let lookup = |id: Uuid, _since: Timestamp| -> sp_core::Result<Vec<EngagementEvent>> {
            windows.get(&id).cloned().unwrap_or_else(|| {
                Err(CoreError::EnrichmentUnavailable {
                    subject: id.to_string(),
                    reason: "not queried".into(),
                })
            })
        };
        let confirmed = confirm_candidates(&pass.candidates, &lookup, self.now, &config);

        let mut insights = pass.insights;
        insights.extend(confirmed.insights);
        rank(&mut insights);
        let report = DetectionReport {
            insights,
            dropped: confirmed.dropped,
        };

        tracing::info!(
            user = %self.user,
            %period,
            insights = report.insights.len(),
            dropped = report.dropped.len(),
            "insights generated"
        );
        Ok(InsightRun {
            snapshot,
            baseline,
            insights: report.insights,
            dropped: report.dropped.len(),
        })
    }

    /// Trailing event windows for each candidate, one blocking query each,
    /// bounded by `enrichment_timeout_ms`.
    async fn enrich(
        &self,
        candidates: &[StabilityCandidate],
        since: Timestamp,
    ) -> HashMap<Uuid, sp_core::Result<Vec<EngagementEvent>>> {
        let budget = Duration::from_millis(self.config.enrichment_timeout_ms);
        let mut out = HashMap::with_capacity(candidates.len());

        for candidate in candidates {
            let id = candidate.subtopic_id;
            let store = Arc::clone(&self.store);
            let handle = tokio::task::spawn_blocking(move || {
                let store = store.blocking_lock();
                store.recent_events(id, since, usize::MAX)
            });

            let result = match tokio::time::timeout(budget, handle).await {
                Ok(Ok(Ok(events))) => Ok(events),
                Ok(Ok(Err(e))) => Err(unavailable(id, e.to_string())),
                Ok(Err(e)) => Err(unavailable(id, e.to_string())),
                Err(_) => Err(unavailable(
                    id,
                    format!("timed out after {}ms", budget.as_millis()),
                )),
            };
            if let Err(e) = &result {
                tracing::warn!(subtopic = %id, "dropping stability candidate: {e}");
            }
            out.insert(id, result);
        }
        out
    }

    pub async fn retention(&self) -> Result<RetentionOutcome> {
        let store = self.store.lock().await;
        let outcome = apply_retention_policy(&*store, &self.user, self.now, &RetentionPolicy::default())
            .context("failed to apply retention policy")?;
        tracing::info!(
            user = %self.user,
            deleted = outcome.deleted_count,
            kept = outcome.kept_count,
            "retention applied"
        );
        Ok(outcome)
    }
}

fn unavailable(id: Uuid, reason: String) -> CoreError {
    CoreError::EnrichmentUnavailable {
        subject: id.to_string(),
        reason,
    }
}

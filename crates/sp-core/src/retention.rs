//! Tiered snapshot pruning.
//!
//! ```text
//! age 0–30     keep the 30 most recent
//! age 31–60    keep up to 4 on the weekly anchor (Sunday)
//! age 61–390   keep up to 12 on the 1st of the month
//! older        delete
//! ```
//!
//! Selection builds a complete plan before anything is deleted, and deletion
//! is a single batch.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    RETENTION_DAILY_KEEP, RETENTION_DAILY_MAX_AGE, RETENTION_MONTHLY_KEEP,
    RETENTION_MONTHLY_MAX_AGE, RETENTION_WEEKLY_KEEP, RETENTION_WEEKLY_MAX_AGE,
};
use crate::snapshot::{Snapshot, SnapshotType};
use crate::source::{SnapshotSink, SnapshotSource};
use crate::time::{Timestamp, age_in_days};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub daily_keep: usize,
    pub daily_max_age: i64,
    pub weekly_keep: usize,
    pub weekly_max_age: i64,
    pub weekly_anchor: Weekday,
    pub monthly_keep: usize,
    pub monthly_max_age: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily_keep: RETENTION_DAILY_KEEP,
            daily_max_age: RETENTION_DAILY_MAX_AGE,
            weekly_keep: RETENTION_WEEKLY_KEEP,
            weekly_max_age: RETENTION_WEEKLY_MAX_AGE,
            weekly_anchor: Weekday::Sun,
            monthly_keep: RETENTION_MONTHLY_KEEP,
            monthly_max_age: RETENTION_MONTHLY_MAX_AGE,
        }
    }
}

/// The fields retention looks at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapshotMeta {
    pub id: Uuid,
    pub taken_at: Timestamp,
    pub snapshot_type: SnapshotType,
}

impl From<&Snapshot> for SnapshotMeta {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: s.id,
            taken_at: s.taken_at,
            snapshot_type: s.snapshot_type,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetentionPlan {
    pub keep: Vec<Uuid>,
    pub delete: Vec<Uuid>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionOutcome {
    pub deleted_count: usize,
    pub kept_count: usize,
}

impl RetentionPolicy {
    fn weekly(&self, s: &SnapshotMeta) -> bool {
        s.snapshot_type == SnapshotType::Weekly || s.taken_at.weekday() == self.weekly_anchor
    }

    fn monthly(&self, s: &SnapshotMeta) -> bool {
        s.snapshot_type == SnapshotType::Monthly || s.taken_at.day() == 1
    }

    /// One representative per calendar day among `candidates`: the one tagged
    /// `preferred` if any, otherwise the newest. Ties break on id.
    fn per_day<'a>(
        candidates: impl Iterator<Item = &'a SnapshotMeta>,
        preferred: SnapshotType,
    ) -> HashSet<Uuid> {
        let mut best: HashMap<NaiveDate, &SnapshotMeta> = HashMap::new();
        let rank = |s: &SnapshotMeta| (s.snapshot_type == preferred, s.taken_at, s.id);
        for s in candidates {
            best.entry(s.taken_at.date_naive())
                .and_modify(|cur| {
                    if rank(s) > rank(*cur) {
                        *cur = s;
                    }
                })
                .or_insert(s);
        }
        best.into_values().map(|s| s.id).collect()
    }

    /// Decide what survives. Pure; input order does not matter.
    ///
    /// The weekly and monthly tiers count days, not snapshots: a day holding
    /// both a daily and a weekly run fills one slot, and its other snapshots
    /// are deleted.
    pub fn plan(&self, snapshots: &[SnapshotMeta], now: Timestamp) -> RetentionPlan {
        let mut ordered: Vec<&SnapshotMeta> = snapshots.iter().collect();
        ordered.sort_by(|a, b| b.taken_at.cmp(&a.taken_at).then(b.id.cmp(&a.id)));

        let age = |s: &SnapshotMeta| age_in_days(s.taken_at, now);
        let weekly_tier =
            |s: &SnapshotMeta| (self.daily_max_age + 1..=self.weekly_max_age).contains(&age(s));
        let monthly_tier =
            |s: &SnapshotMeta| (self.weekly_max_age + 1..=self.monthly_max_age).contains(&age(s));

        let weekly_days = Self::per_day(
            ordered.iter().copied().filter(|s| weekly_tier(*s) && self.weekly(*s)),
            SnapshotType::Weekly,
        );
        let monthly_days = Self::per_day(
            ordered.iter().copied().filter(|s| monthly_tier(*s) && self.monthly(*s)),
            SnapshotType::Monthly,
        );

        let (mut daily, mut weekly, mut monthly) = (0usize, 0usize, 0usize);
        let mut plan = RetentionPlan::default();

        for s in ordered {
            let keep = if age(s) <= self.daily_max_age {
                daily += 1;
                daily <= self.daily_keep
            } else if weekly_tier(s) {
                let hit = weekly < self.weekly_keep && weekly_days.contains(&s.id);
                weekly += usize::from(hit);
                hit
            } else if monthly_tier(s) {
                let hit = monthly < self.monthly_keep && monthly_days.contains(&s.id);
                monthly += usize::from(hit);
                hit
            } else {
                false
            };

            if keep {
                plan.keep.push(s.id);
            } else {
                plan.delete.push(s.id);
            }
        }
        plan
    }
}

/// Read every snapshot a user has, plan, then delete in one batch.
pub fn apply_retention_policy<S>(
    store: &S,
    user_id: &str,
    now: Timestamp,
    policy: &RetentionPolicy,
) -> Result<RetentionOutcome, <S as SnapshotSource>::Error>
where
    S: SnapshotSource + SnapshotSink<Error = <S as SnapshotSource>::Error>,
{
    let snapshots = store.snapshots(user_id, now, None, None)?;
    let metas: Vec<SnapshotMeta> = snapshots.iter().map(SnapshotMeta::from).collect();
    let plan = policy.plan(&metas, now);

    let deleted_count = if plan.delete.is_empty() {
        0
    } else {
        store.delete_snapshots(&plan.delete)?
    };

    Ok(RetentionOutcome {
        deleted_count,
        kept_count: plan.keep.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::CoreError;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap()
    }

    fn daily_history(days: i64) -> Vec<SnapshotMeta> {
        (0..days)
            .map(|d| SnapshotMeta {
                id: Uuid::new_v4(),
                taken_at: now() - Duration::days(d),
                snapshot_type: SnapshotType::Daily,
            })
            .collect()
    }

    fn kept_ages(plan: &RetentionPlan, history: &[SnapshotMeta]) -> Vec<(i64, Timestamp)> {
        history
            .iter()
            .filter(|s| plan.keep.contains(&s.id))
            .map(|s| (age_in_days(s.taken_at, now()), s.taken_at))
            .collect()
    }

    #[test]
    fn test_400_day_history() {
        let history = daily_history(400);
        let plan = RetentionPolicy::default().plan(&history, now());
        let kept = kept_ages(&plan, &history);

        let recent = kept.iter().filter(|(age, _)| *age <= 30).count();
        assert_eq!(recent, 30);

        let weekly: Vec<_> = kept.iter().filter(|(a, _)| (31..=60).contains(a)).collect();
        assert!(weekly.len() <= 4 && !weekly.is_empty());
        assert!(weekly.iter().all(|(_, t)| t.weekday() == Weekday::Sun));

        let monthly: Vec<_> = kept.iter().filter(|(a, _)| (61..=390).contains(a)).collect();
        assert!(monthly.len() <= 12 && !monthly.is_empty());
        assert!(monthly.iter().all(|(_, t)| t.day() == 1));

        assert!(kept.iter().all(|(a, _)| *a <= 390));
        assert_eq!(plan.keep.len() + plan.delete.len(), 400);
    }

    #[test]
    fn test_order_insensitive() {
        let mut history = daily_history(120);
        let forward = RetentionPolicy::default().plan(&history, now());
        history.reverse();
        let backward = RetentionPolicy::default().plan(&history, now());

        let mut a = forward.keep.clone();
        let mut b = backward.keep.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tagged_weekly_snapshot_kept() {
        // 45 days before a Monday-anchored policy's now; tagged weekly
        let s = SnapshotMeta {
            id: Uuid::new_v4(),
            taken_at: now() - Duration::days(45),
            snapshot_type: SnapshotType::Weekly,
        };
        let policy = RetentionPolicy {
            weekly_anchor: Weekday::Mon,
            ..RetentionPolicy::default()
        };
        assert_eq!(policy.plan(&[s], now()).keep, vec![s.id]);
    }

    #[test]
    fn test_same_day_duplicates_fill_one_slot() {
        // A daily run every day plus a weekly-tagged run every Sunday.
        let mut history = daily_history(120);
        let sundays: Vec<SnapshotMeta> = history
            .iter()
            .filter(|s| s.taken_at.weekday() == Weekday::Sun)
            .map(|s| SnapshotMeta {
                id: Uuid::new_v4(),
                taken_at: s.taken_at + Duration::minutes(5),
                snapshot_type: SnapshotType::Weekly,
            })
            .collect();
        history.extend(sundays.iter().copied());

        let plan = RetentionPolicy::default().plan(&history, now());
        let kept: Vec<&SnapshotMeta> = history
            .iter()
            .filter(|s| plan.keep.contains(&s.id))
            .collect();

        let weekly: Vec<_> = kept
            .iter()
            .filter(|s| (31..=60).contains(&age_in_days(s.taken_at, now())))
            .collect();
        let days: HashSet<NaiveDate> = weekly.iter().map(|s| s.taken_at.date_naive()).collect();
        assert_eq!(weekly.len(), 4);
        assert_eq!(days.len(), 4);
        assert!(weekly.iter().all(|s| s.snapshot_type == SnapshotType::Weekly));

        let monthly: Vec<_> = kept
            .iter()
            .filter(|s| (61..=390).contains(&age_in_days(s.taken_at, now())))
            .collect();
        let days: HashSet<NaiveDate> = monthly.iter().map(|s| s.taken_at.date_naive()).collect();
        assert_eq!(monthly.len(), days.len());
    }

    #[test]
    fn test_tagged_monthly_preferred_on_the_first() {
        let first = Utc.with_ymd_and_hms(2026, 6, 1, 3, 0, 0).unwrap();
        let daily = SnapshotMeta {
            id: Uuid::new_v4(),
            taken_at: first + Duration::hours(1),
            snapshot_type: SnapshotType::Daily,
        };
        let monthly = SnapshotMeta {
            id: Uuid::new_v4(),
            taken_at: first,
            snapshot_type: SnapshotType::Monthly,
        };
        let plan = RetentionPolicy::default().plan(&[daily, monthly], now());
        assert_eq!(plan.keep, vec![monthly.id]);
        assert_eq!(plan.delete, vec![daily.id]);
    }

    #[test]
    fn test_short_history_keeps_everything() {
        let history = daily_history(10);
        let plan = RetentionPolicy::default().plan(&history, now());
        assert_eq!(plan.keep.len(), 10);
        assert!(plan.delete.is_empty());
    }

    /// Records every batch delete it receives.
    struct FakeStore {
        snapshots: Vec<Snapshot>,
        deletes: RefCell<Vec<Vec<Uuid>>>,
    }

    impl SnapshotSource for FakeStore {
        type Error = CoreError;

        fn snapshots(
            &self,
            _user_id: &str,
            _now: Timestamp,
            _window_days: Option<u32>,
            _snapshot_type: Option<SnapshotType>,
        ) -> Result<Vec<Snapshot>, CoreError> {
            Ok(self.snapshots.clone())
        }
    }

    impl SnapshotSink for FakeStore {
        type Error = CoreError;

        fn persist_snapshot(&self, _user_id: &str, _snapshot: &Snapshot) -> Result<(), CoreError> {
            Ok(())
        }

        fn delete_snapshots(&self, ids: &[Uuid]) -> Result<usize, CoreError> {
            self.deletes.borrow_mut().push(ids.to_vec());
            Ok(ids.len())
        }
    }

    #[test]
    fn test_apply_deletes_in_one_batch() {
        let snapshots = daily_history(100)
            .into_iter()
            .map(|m| Snapshot {
                id: m.id,
                user_id: "u1".into(),
                taken_at: m.taken_at,
                snapshot_type: m.snapshot_type,
                topics: Vec::new(),
            })
            .collect();
        let store = FakeStore {
            snapshots,
            deletes: RefCell::new(Vec::new()),
        };

        let outcome =
            apply_retention_policy(&store, "u1", now(), &RetentionPolicy::default()).unwrap();
        assert_eq!(outcome.kept_count + outcome.deleted_count, 100);
        assert!(outcome.kept_count >= 30);
        assert_eq!(store.deletes.borrow().len(), 1);
    }
}

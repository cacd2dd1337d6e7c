use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use sp_core::{
    ChildState, DetectionInput, EngagementEvent, Histogram, Snapshot, SnapshotType,
    StabilityConfig, State, Timestamp, TopicSnapshot, WeightTier, baseline_for_period,
    detect_insights, ReportPeriod,
};

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// 20 root topics × 10 children, evidence drawn from a seeded rng.
fn random_snapshot(rng: &mut SmallRng, ids: &[(Uuid, Vec<Uuid>)], at: Timestamp) -> Snapshot {
    let topics = ids
        .iter()
        .map(|(root, children)| {
            let children: Vec<ChildState> = children
                .iter()
                .map(|&id| {
                    let evidence = rng.random_range(0.0..10.0);
                    ChildState {
                        id,
                        name: String::new(),
                        evidence,
                        state: State::classify(evidence),
                    }
                })
                .collect();
            TopicSnapshot {
                topic_id: *root,
                name: String::new(),
                histogram: Histogram::from_states(children.iter().map(|c| c.state)),
                total_evidence: children.iter().map(|c| c.evidence).sum(),
                children,
                events_per_day: rng.random_range(0.0..20.0),
            }
        })
        .collect();
    Snapshot {
        id: Uuid::new_v4(),
        user_id: "bench".into(),
        taken_at: at,
        snapshot_type: SnapshotType::Daily,
        topics,
    }
}

fn bench_detect_200_children(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(42);
    let ids: Vec<(Uuid, Vec<Uuid>)> = (0..20)
        .map(|_| (Uuid::new_v4(), (0..10).map(|_| Uuid::new_v4()).collect()))
        .collect();

    let history: Vec<Snapshot> = (1..=30)
        .map(|d| random_snapshot(&mut rng, &ids, now() - Duration::days(d)))
        .collect();
    let baseline = baseline_for_period(&history, ReportPeriod::Weekly);
    let snapshot = random_snapshot(&mut rng, &ids, now());

    let events: Vec<EngagementEvent> = (0..2_000)
        .map(|i| {
            let (_, children) = &ids[rng.random_range(0..ids.len())];
            let child = children[rng.random_range(0..children.len())];
            let at = now() - Duration::minutes(rng.random_range(0..7 * 24 * 60));
            EngagementEvent::new(child, WeightTier::Engaged, 0.8, at)
                .with_url(format!("https://example.com/{i}"))
                .with_word_count(rng.random_range(0..2_000))
        })
        .collect();

    let input = DetectionInput {
        snapshot: &snapshot,
        baseline: &baseline,
        recent_events: &events,
        now: now(),
    };
    let enrichment = |id: Uuid, since: Timestamp| -> sp_core::Result<Vec<EngagementEvent>> {
        Ok(events
            .iter()
            .filter(|e| e.topic_id == id && e.timestamp >= since)
            .cloned()
            .collect())
    };

    c.bench_function("detect_insights_200_children", |b| {
        b.iter(|| detect_insights(&input, &enrichment, &StabilityConfig::default()));
    });
}

fn bench_baseline_90_snapshots(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(7);
    let ids: Vec<(Uuid, Vec<Uuid>)> = (0..20)
        .map(|_| (Uuid::new_v4(), (0..10).map(|_| Uuid::new_v4()).collect()))
        .collect();
    let history: Vec<Snapshot> = (1..=90)
        .map(|d| random_snapshot(&mut rng, &ids, now() - Duration::days(d)))
        .collect();

    c.bench_function("baseline_monthly_90_snapshots", |b| {
        b.iter(|| baseline_for_period(&history, ReportPeriod::Monthly));
    });
}

criterion_group!(benches, bench_detect_200_children, bench_baseline_90_snapshots);
criterion_main!(benches);

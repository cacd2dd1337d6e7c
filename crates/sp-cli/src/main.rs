mod pipeline;

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use sp_core::time::{parse_rfc3339, to_rfc3339};
use sp_core::{
    EngagementEvent, Insight, ReportPeriod, Snapshot, SnapshotType, Timestamp, WeightTier,
    decayed_evidence,
};
use sp_store::{DataDir, Store};

use crate::pipeline::{InsightRun, Job};

#[derive(Parser)]
#[command(name = "sp", about = "Topic engagement tracking and insight batch runner")]
struct Cli {
    /// User id (defaults to `default_user` from config.toml)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Evaluate as of this RFC 3339 time instead of the wall clock
    #[arg(long, global = true)]
    now: Option<String>,

    /// Print JSON instead of a plain summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage topics
    Topic {
        #[command(subcommand)]
        command: TopicCommands,
    },

    /// Record an engagement event against a topic
    Event {
        /// Topic name or id
        topic: String,

        /// ambient, engaged, committed, or a raw weight
        #[arg(long)]
        weight: String,

        /// Relevance in [0, 1]
        #[arg(long, default_value_t = 1.0)]
        relevance: f64,

        /// Reading depth in [0, 1.5]
        #[arg(long, default_value_t = 1.0)]
        depth: f64,

        /// Source URL
        #[arg(long)]
        url: Option<String>,

        /// Words read
        #[arg(long, default_value_t = 0)]
        words: u32,
    },

    /// Decay every topic to now
    Decay,

    /// Take and store a snapshot
    Snapshot {
        /// daily, weekly or monthly
        #[arg(long = "type", default_value = "daily")]
        snapshot_type: String,
    },

    /// Show the rolling baseline
    Baseline {
        /// daily, weekly, monthly or yearly
        #[arg(long, default_value = "daily")]
        period: String,
    },

    /// Detect insights against the baseline
    Insights {
        #[arg(long, default_value = "daily")]
        period: String,
    },

    /// Prune old snapshots
    Retention,

    /// Snapshot, insights, then retention
    Run {
        #[arg(long = "type", default_value = "daily")]
        snapshot_type: String,

        #[arg(long, default_value = "daily")]
        period: String,
    },

    /// Show storage statistics
    Stats,
}

#[derive(Subcommand)]
enum TopicCommands {
    /// Create a topic, or a subtopic with --parent
    Add {
        name: String,

        /// Parent topic name or id
        #[arg(long)]
        parent: Option<String>,
    },

    /// List topics as a tree
    List,
}

/// Resolved per-invocation context.
struct Session {
    store: Store,
    user: String,
    now: Timestamp,
    config: sp_store::Config,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let dir = DataDir::open(None).context("failed to open data directory")?;
        let store = dir.open_store().context("failed to open store")?;
        let config = dir.config().clone();
        let user = cli
            .user
            .clone()
            .unwrap_or_else(|| config.default_user.clone());
        let now = match cli.now.as_deref() {
            Some(s) => parse_rfc3339(s).with_context(|| format!("invalid --now '{s}'"))?,
            None => Utc::now(),
        };
        Ok(Self {
            store,
            user,
            now,
            config,
        })
    }

    fn into_job(self) -> Result<Job> {
        Job::new(self.store, self.user, self.now, self.config)
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Topic { command } => match command {
            TopicCommands::Add { name, parent } => cmd_topic_add(&cli, name, parent.as_deref()),
            TopicCommands::List => cmd_topic_list(&cli),
        },
        Commands::Event {
            topic,
            weight,
            relevance,
            depth,
            url,
            words,
        } => cmd_event(&cli, topic, weight, *relevance, *depth, url.as_deref(), *words),
        Commands::Decay => cmd_decay(&cli),
        Commands::Snapshot { snapshot_type } => cmd_snapshot(&cli, snapshot_type).await,
        Commands::Baseline { period } => cmd_baseline(&cli, period).await,
        Commands::Insights { period } => cmd_insights(&cli, period).await,
        Commands::Retention => cmd_retention(&cli).await,
        Commands::Run {
            snapshot_type,
            period,
        } => cmd_run(&cli, snapshot_type, period).await,
        Commands::Stats => cmd_stats(&cli),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn parse_period(s: &str) -> Result<ReportPeriod> {
    s.parse().with_context(|| format!("invalid --period '{s}'"))
}

fn parse_snapshot_type(s: &str) -> Result<SnapshotType> {
    s.parse().with_context(|| format!("invalid --type '{s}'"))
}

/// A tier name or a raw non-negative weight.
fn parse_weight(s: &str) -> Result<f64> {
    if let Ok(tier) = s.parse::<WeightTier>() {
        return Ok(tier.weight());
    }
    match s.parse::<f64>() {
        Ok(w) if w.is_finite() && w >= 0.0 => Ok(w),
        _ => bail!("invalid --weight '{s}': expected ambient, engaged, committed or a number"),
    }
}

fn cmd_topic_add(cli: &Cli, name: &str, parent: Option<&str>) -> Result<()> {
    let session = Session::open(cli)?;
    let parent_id = match parent {
        Some(p) => Some(
            session
                .store
                .find_topic(&session.user, p)
                .context("failed to look up parent")?
                .with_context(|| format!("parent topic '{p}' not found"))?
                .id,
        ),
        None => None,
    };
    let topic = session
        .store
        .create_topic(&session.user, name, parent_id, session.now)
        .context("failed to create topic")?;

    if cli.json {
        return print_json(&topic);
    }
    println!("created {} ({})", topic.name, topic.id);
    Ok(())
}

fn cmd_topic_list(cli: &Cli) -> Result<()> {
    let session = Session::open(cli)?;
    let trees = session
        .store
        .topic_trees(&session.user)
        .context("failed to load topics")?;

    if cli.json {
        let topics: Vec<_> = trees
            .iter()
            .flat_map(|t| std::iter::once(&t.root).chain(t.children.iter()))
            .collect();
        return print_json(&topics);
    }
    if trees.is_empty() {
        println!("(no topics)");
        return Ok(());
    }
    for tree in &trees {
        for (depth, topic) in std::iter::once((0usize, &tree.root))
            .chain(tree.children.iter().map(|c| (1, c)))
        {
            let evidence = decayed_evidence(topic.evidence, topic.last_updated_at, session.now);
            println!(
                "{:indent$}{}  {:.2}  {}  {}",
                "",
                topic.name,
                evidence,
                sp_core::State::classify(evidence),
                topic.id,
                indent = depth * 2
            );
        }
    }
    Ok(())
}

fn cmd_event(
    cli: &Cli,
    topic: &str,
    weight: &str,
    relevance: f64,
    depth: f64,
    url: Option<&str>,
    words: u32,
) -> Result<()> {
    let session = Session::open(cli)?;
    let topic = session
        .store
        .find_topic(&session.user, topic)
        .context("failed to look up topic")?
        .with_context(|| format!("topic '{topic}' not found"))?;

    let mut event = EngagementEvent::new(topic.id, WeightTier::Engaged, relevance, session.now)
        .with_reading_depth(depth)
        .with_word_count(words);
    event.base_weight = parse_weight(weight)?;
    if let Some(url) = url {
        event = event.with_url(url);
    }

    let result = session
        .store
        .record_event(&event, session.now)
        .context("failed to record event")?;

    if cli.json {
        return print_json(&result);
    }
    if result.transition_occurred {
        println!(
            "{}: {:.2} → {:.2} ({} → {})",
            topic.name,
            result.evidence_before,
            result.evidence_after,
            result.old_dominant_state,
            result.new_dominant_state
        );
    } else {
        println!(
            "{}: {:.2} → {:.2} ({})",
            topic.name, result.evidence_before, result.evidence_after, result.new_dominant_state
        );
    }
    Ok(())
}

fn cmd_decay(cli: &Cli) -> Result<()> {
    let session = Session::open(cli)?;
    let outcome = session
        .store
        .decay_all(&session.user, session.now)
        .context("failed to decay topics")?;

    if cli.json {
        let moved: Vec<_> = outcome.transitions.iter().map(|(_, r)| r).collect();
        return print_json(&moved);
    }
    println!(
        "decayed {} topics, {} changed state",
        outcome.topics,
        outcome.transitions.len()
    );
    for (topic, result) in &outcome.transitions {
        println!(
            "  {}: {} → {}",
            topic.name, result.old_dominant_state, result.new_dominant_state
        );
    }
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "snapshot {} ({}, {})",
        snapshot.id,
        snapshot.snapshot_type,
        to_rfc3339(snapshot.taken_at)
    );
    for ts in &snapshot.topics {
        let [latent, discovered, engaged, saturated] = ts.histogram.as_array();
        println!(
            "  {}: evidence={:.2} histogram=[L{latent} D{discovered} E{engaged} S{saturated}] events/day={}",
            ts.name, ts.total_evidence, ts.events_per_day
        );
    }
}

async fn cmd_snapshot(cli: &Cli, snapshot_type: &str) -> Result<()> {
    let snapshot_type = parse_snapshot_type(snapshot_type)?;
    let job = Session::open(cli)?.into_job()?;
    let snapshot = job.take_snapshot(snapshot_type).await?;

    if cli.json {
        return print_json(&snapshot);
    }
    print_snapshot(&snapshot);
    Ok(())
}

async fn cmd_baseline(cli: &Cli, period: &str) -> Result<()> {
    let period = parse_period(period)?;
    let job = Session::open(cli)?.into_job()?;
    let baseline = job.baseline(period, job.now, None).await?;

    if cli.json {
        return print_json(&baseline);
    }
    if baseline.is_empty() {
        println!("(no snapshots in the {period} window)");
        return Ok(());
    }

    let names = topic_names(&job).await?;
    println!("{period} baseline over {} snapshots", baseline.window);
    let mut topics: Vec<_> = baseline.topics.iter().collect();
    topics.sort_by(|a, b| b.1.avg_evidence.total_cmp(&a.1.avg_evidence));
    for (id, tb) in topics {
        let [l, d, e, s] = tb.avg_histogram;
        println!(
            "  {}: evidence={:.2} histogram=[L{l:.1} D{d:.1} E{e:.1} S{s:.1}] events/day={:.1}",
            names.get(id).map(String::as_str).unwrap_or("?"),
            tb.avg_evidence,
            tb.avg_events_per_day
        );
    }
    Ok(())
}

async fn topic_names(job: &Job) -> Result<HashMap<Uuid, String>> {
    let store = job.store.lock().await;
    Ok(store
        .list_topics(&job.user)
        .context("failed to load topics")?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect())
}

fn describe(insight: &Insight, snapshot: &Snapshot) -> String {
    let topic = snapshot.topic(insight.topic_id);
    let mut subject = topic.map(|t| t.name.clone()).unwrap_or_else(|| "?".into());
    if let Some(sub) = insight.subtopic_id
        && let Some(child) = topic.and_then(|t| t.child(sub))
    {
        subject = format!("{subject}/{}", child.name);
    }
    let change = insight
        .change_percent
        .map(|p| format!(" ({p:+.0}%)"))
        .unwrap_or_default();
    format!(
        "[{}] {} {}: {:.2} vs {:.2}{change}",
        insight.severity,
        insight.kind(),
        subject,
        insight.current_value,
        insight.baseline_value
    )
}

fn print_insights(run: &InsightRun) {
    if run.insights.is_empty() {
        println!("(no insights)");
    }
    for insight in &run.insights {
        println!("{}", describe(insight, &run.snapshot));
    }
    if run.dropped > 0 {
        println!("{} stability candidates dropped", run.dropped);
    }
}

async fn cmd_insights(cli: &Cli, period: &str) -> Result<()> {
    let period = parse_period(period)?;
    let job = Session::open(cli)?.into_job()?;
    let run = job.generate_insights(period, None).await?;

    if cli.json {
        return print_json(&run.insights);
    }
    print_insights(&run);
    Ok(())
}

async fn cmd_retention(cli: &Cli) -> Result<()> {
    let job = Session::open(cli)?.into_job()?;
    let outcome = job.retention().await?;

    if cli.json {
        return print_json(&outcome);
    }
    println!(
        "retention: deleted {}, kept {}",
        outcome.deleted_count, outcome.kept_count
    );
    Ok(())
}

#[derive(Serialize)]
struct RunSummary<'a> {
    snapshot_id: Uuid,
    insights: &'a [Insight],
    dropped_candidates: usize,
    retention: sp_core::RetentionOutcome,
}

async fn cmd_run(cli: &Cli, snapshot_type: &str, period: &str) -> Result<()> {
    let snapshot_type = parse_snapshot_type(snapshot_type)?;
    let period = parse_period(period)?;
    let job = Session::open(cli)?.into_job()?;

    let snapshot = job.take_snapshot(snapshot_type).await?;
    let run = job.generate_insights(period, Some(snapshot)).await?;
    let retention = job.retention().await?;

    if cli.json {
        return print_json(&RunSummary {
            snapshot_id: run.snapshot.id,
            insights: &run.insights,
            dropped_candidates: run.dropped,
            retention,
        });
    }
    print_snapshot(&run.snapshot);
    print_insights(&run);
    println!(
        "retention: deleted {}, kept {}",
        retention.deleted_count, retention.kept_count
    );
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let session = Session::open(cli)?;
    let stats = session
        .store
        .stats(&session.user)
        .context("failed to get stats")?;

    if cli.json {
        return print_json(&stats);
    }
    let fmt_ts = |ts: Option<Timestamp>| ts.map(to_rfc3339).unwrap_or_else(|| "-".into());
    println!("user:       {}", session.user);
    if let Some(version) = stats.schema_version {
        println!("schema:     v{version}");
    }
    println!("topics:     {}", stats.topics);
    println!("roots:      {}", stats.root_topics);
    println!("events:     {}", stats.events);
    println!("snapshots:  {}", stats.snapshots);
    println!("oldest:     {}", fmt_ts(stats.oldest_snapshot));
    println!("newest:     {}", fmt_ts(stats.newest_snapshot));
    Ok(())
}

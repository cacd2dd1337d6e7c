/// Evidence lower bound for Discovered
pub const THETA_DISCOVERED: f64 = 1.0;

/// Evidence lower bound for Engaged
pub const THETA_ENGAGED: f64 = 3.0;

/// Evidence lower bound for Saturated
pub const THETA_SATURATED: f64 = 6.0;

/// Evidence decay rate λ, per day
pub const DECAY_LAMBDA: f64 = 0.1;

/// Fixed total mass of an entity position vector
pub const TOTAL_MASS: u32 = 100;

/// Base weight tiers: ambient / engaged / committed interaction
pub const WEIGHT_AMBIENT: f64 = 0.2;
pub const WEIGHT_ENGAGED: f64 = 1.0;
pub const WEIGHT_COMMITTED: f64 = 2.0;

/// Upper bound for the reading-depth multiplier
pub const MAX_READING_DEPTH: f64 = 1.5;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

// --- Snapshot / baseline ---

/// Most recent events read per child when rebuilding its evidence
pub const SNAPSHOT_EVENT_LIMIT: usize = 200;

// --- Detector thresholds ---

pub const DRIFT_MEDIUM: f64 = 2.0;
pub const DRIFT_HIGH: f64 = 4.0;

pub const IMBALANCE_SHARE: f64 = 0.40;
pub const IMBALANCE_SHARE_HIGH: f64 = 0.60;

/// Latent-count increase over baseline that counts as a gap
pub const GAP_LATENT_INCREASE: f64 = 1.0;

pub const ACCELERATION_PCT: f64 = 50.0;
pub const ACCELERATION_PCT_HIGH: f64 = 100.0;
pub const DECELERATION_PCT: f64 = -30.0;
pub const DECELERATION_PCT_HIGH: f64 = -50.0;

pub const RABBIT_HOLE_WINDOW_MINUTES: i64 = 60;
pub const RABBIT_HOLE_MIN_URLS: usize = 5;

pub const CONSUMPTION_TRAP_WINDOW_DAYS: i64 = 7;
pub const CONSUMPTION_TRAP_MIN_WORDS: u64 = 10_000;

/// Trailing window read by false-stability enrichment
pub const STABILITY_WINDOW_DAYS: i64 = 14;
/// Evidence gained over the window below which a Saturated child counts as stalled
pub const STABILITY_EPSILON: f64 = 0.5;
/// Events in the window below which a Saturated child counts as stalled
pub const STABILITY_MIN_EVENTS: usize = 3;

// --- Retention ---

pub const RETENTION_DAILY_KEEP: usize = 30;
pub const RETENTION_DAILY_MAX_AGE: i64 = 30;
pub const RETENTION_WEEKLY_KEEP: usize = 4;
pub const RETENTION_WEEKLY_MAX_AGE: i64 = 60;
pub const RETENTION_MONTHLY_KEEP: usize = 12;
pub const RETENTION_MONTHLY_MAX_AGE: i64 = 390;

//! Data directory layout and the optional `config.toml` inside it.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::store::Store;

pub const DATA_DIR_ENV: &str = "SP_DATA_DIR";
pub const DB_FILE: &str = "space-pulse.db";
pub const CONFIG_FILE: &str = "config.toml";

/// Default base directory for all storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".space-pulse")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// `SP_DATA_DIR` if set, otherwise [`default_base_dir`].
pub fn resolve_base_dir() -> PathBuf {
    env::var(DATA_DIR_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_base_dir)
}

/// Tunables read from `config.toml`. Every field is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Most recent events read per topic when building a snapshot.
    pub snapshot_event_limit: usize,
    /// Trailing window for stability confirmation.
    pub enrichment_window_days: i64,
    /// Per-candidate budget for enrichment queries.
    pub enrichment_timeout_ms: u64,
    /// User id when `--user` is not given.
    pub default_user: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_event_limit: sp_core::constants::SNAPSHOT_EVENT_LIMIT,
            enrichment_window_days: sp_core::constants::STABILITY_WINDOW_DAYS,
            enrichment_timeout_ms: 2000,
            default_user: "default".to_string(),
        }
    }
}

/// Accepted range for `enrichment_window_days`.
pub const ENRICHMENT_WINDOW_RANGE: std::ops::RangeInclusive<i64> = 1..=3650;

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StoreError::InvalidData(format!("invalid {CONFIG_FILE}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the batch job cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| {
            Err(StoreError::InvalidData(format!("invalid {CONFIG_FILE}: {msg}")))
        };
        if !ENRICHMENT_WINDOW_RANGE.contains(&self.enrichment_window_days) {
            return invalid(format!(
                "enrichment_window_days must be in {}..={}, got {}",
                ENRICHMENT_WINDOW_RANGE.start(),
                ENRICHMENT_WINDOW_RANGE.end(),
                self.enrichment_window_days
            ));
        }
        if self.enrichment_timeout_ms == 0 {
            return invalid("enrichment_timeout_ms must be positive".into());
        }
        if self.snapshot_event_limit == 0 {
            return invalid("snapshot_event_limit must be positive".into());
        }
        if self.default_user.trim().is_empty() {
            return invalid("default_user must not be empty".into());
        }
        Ok(())
    }

    /// Read `config.toml` from `base`. A missing file yields defaults.
    pub fn load(base: &Path) -> Result<Self> {
        let path = base.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::InvalidData(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

/// An opened data directory: its config and the path of its database.
#[derive(Clone, Debug)]
pub struct DataDir {
    base: PathBuf,
    config: Config,
}

impl DataDir {
    /// Create the directory if needed and load its config.
    /// `base_dir` overrides [`resolve_base_dir`] (for testing).
    pub fn open(base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(resolve_base_dir);
        fs::create_dir_all(&base).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", base.display()))
        })?;
        let config = Config::load(&base)?;
        tracing::debug!(base = %base.display(), "data directory opened");
        Ok(Self { base, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db_path(&self) -> PathBuf {
        self.base.join(DB_FILE)
    }

    pub fn open_store(&self) -> Result<Store> {
        Store::open(&self.db_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            "enrichment_timeout_ms = 500\ndefault_user = \"alice\"\n",
        )
        .unwrap();
        assert_eq!(config.enrichment_timeout_ms, 500);
        assert_eq!(config.default_user, "alice");
        assert_eq!(config.snapshot_event_limit, 200);
        assert_eq!(config.enrichment_window_days, 14);
    }

    #[test]
    fn test_bad_config_rejected() {
        let err = Config::parse("snapshot_event_limit = \"many\"").unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_window_out_of_range_rejected() {
        for days in ["-14", "0", "3651", "4611686018427387903"] {
            let err = Config::parse(&format!("enrichment_window_days = {days}")).unwrap_err();
            assert!(
                err.to_string().contains("enrichment_window_days"),
                "{days}: {err}"
            );
        }
        assert_eq!(
            Config::parse("enrichment_window_days = 3650")
                .unwrap()
                .enrichment_window_days,
            3650
        );
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = Config::parse("enrichment_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("enrichment_timeout_ms"));

        let err = Config::parse("snapshot_event_limit = 0").unwrap_err();
        assert!(err.to_string().contains("snapshot_event_limit"));

        let err = Config::parse("default_user = \"  \"").unwrap_err();
        assert!(err.to_string().contains("default_user"));
    }

    #[test]
    fn test_data_dir_rejects_bad_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "enrichment_window_days = -14\n").unwrap();
        assert!(DataDir::open(Some(tmp.path())).is_err());
    }

    #[test]
    fn test_data_dir_creates_database() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("nested");
        let dir = DataDir::open(Some(&base)).unwrap();
        assert_eq!(dir.config(), &Config::default());

        dir.open_store().unwrap();
        assert!(base.join(DB_FILE).exists());
    }

    #[test]
    fn test_data_dir_reads_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "snapshot_event_limit = 50\n").unwrap();
        let dir = DataDir::open(Some(tmp.path())).unwrap();
        assert_eq!(dir.config().snapshot_event_limit, 50);
    }
}

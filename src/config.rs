//! TOML configuration for the workflow rerunner.
//!
//! Every section falls back to compiled-in defaults, so an empty file (or no
//! file at all) is valid as long as the repository is supplied on the command
//! line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::policy::{EligibilityPolicy, DEFAULT_CANCELLED_MAX_AGE_DAYS, MAX_CANCELLED_MAX_AGE_DAYS};

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "RERUNNER_CONFIG";

/// Config file looked up in the working directory when nothing else is given.
pub const LOCAL_CONFIG: &str = "rerunner.toml";

/// Upper bound for every polling delay, interval and timeout.
pub const MAX_POLLING_SECS: u64 = 30 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RerunnerConfig {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RerunnerConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded rerunner configuration");
        Ok(config)
    }

    /// Resolve configuration, in order:
    /// 1. `explicit` (from `--config`); failing to load it is an error.
    /// 2. The path in `$RERUNNER_CONFIG`.
    /// 3. `./rerunner.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "RERUNNER_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            return Self::load(local);
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.github.owner.trim().is_empty() || self.github.repo.trim().is_empty() {
            bail!("repository owner and name are required (set [github] owner/repo or pass --owner/--repo)");
        }
        if self.polling.interval_secs == 0 {
            bail!("polling.interval_secs must be greater than zero");
        }
        if self.polling.max_status_failures == 0 {
            bail!("polling.max_status_failures must be at least 1");
        }
        if !(0..=MAX_CANCELLED_MAX_AGE_DAYS).contains(&self.policy.cancelled_max_age_days) {
            bail!(
                "policy.cancelled_max_age_days must be between 0 and {}",
                MAX_CANCELLED_MAX_AGE_DAYS
            );
        }
        for (name, secs) in [
            ("polling.initial_delay_secs", self.polling.initial_delay_secs),
            ("polling.interval_secs", self.polling.interval_secs),
            ("polling.timeout_secs", self.polling.timeout_secs),
        ] {
            if secs > MAX_POLLING_SECS {
                bail!("{name} must be at most {MAX_POLLING_SECS} (30 days)");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API root; point at `https://<host>/api/v3` for GitHub Enterprise.
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Personal access or app token. Never written back out.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            token: None,
            user_agent: concat!("workflow-rerunner/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Page size for the run listing (GitHub caps it at 100).
    pub per_page: u8,
    /// Value of the listing's `status` query parameter. `completed` returns
    /// both failed and cancelled runs; an empty string sends no filter.
    pub status_filter: String,
    pub snapshot_path: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            status_filter: "completed".to_string(),
            snapshot_path: PathBuf::from("failed_workflows.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub cancelled_max_age_days: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cancelled_max_age_days: DEFAULT_CANCELLED_MAX_AGE_DAYS,
        }
    }
}

impl PolicyConfig {
    pub fn policy(&self) -> EligibilityPolicy {
        EligibilityPolicy::with_max_age_days(self.cancelled_max_age_days)
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait between a successful rerun request and the first status check.
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    /// Give up on a run this long after its rerun was accepted.
    pub timeout_secs: u64,
    /// Consecutive failed status checks tolerated before giving up.
    pub max_status_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 10,
            interval_secs: 5,
            timeout_secs: 3600,
            max_status_failures: 3,
        }
    }
}

impl PollingConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

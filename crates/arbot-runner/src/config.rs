//! Runner configuration.
//!
//! Provides [`RunnerConfig`] with defaults for the data directory,
//! sweep parallelism, and commit retry policy. Customized
//! programmatically or from CLI flags in the sweeper binary.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a settlement runner instance.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Maximum number of users settled concurrently during a sweep.
    pub max_concurrency: usize,
    /// How many times one invocation retries after losing a commit race
    /// before giving up with `Contended`.
    pub max_commit_attempts: u32,
    /// How long a commit waits for per-user locks before failing.
    pub lock_timeout: Duration,
    /// Log level filter string (e.g. "info", "debug", "arbot_runner=trace").
    pub log_level: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arbot");

        Self {
            data_dir,
            max_concurrency: 8,
            max_commit_attempts: 3,
            lock_timeout: Duration::from_secs(2),
            log_level: "info".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Path to the RocksDB settlement data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("settledata")
    }
}

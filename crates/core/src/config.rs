// crates/core/src/config.rs
//! Process-wide configuration for the orchestration core.
//!
//! The work root and thresholds are injected into `Service` at construction
//! rather than read from ad hoc global state, so tests can run against a
//! scratch directory and short TTLs.

use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::AsyncThresholds;

/// Configuration shared by the executors, dispatcher, and cleanup timers.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Root directory under which every job workspace is created.
    pub work_root: PathBuf,
    /// Per-input size ceiling in bytes.
    pub max_file_bytes: u64,
    /// Aggregate size ceiling across all staged inputs of one job.
    pub max_total_bytes: u64,
    /// Per-input page ceiling.
    pub max_pages: u32,
    /// How long a finished job's workspace (and thus its result file) lives
    /// before the delayed cleanup removes it.
    pub job_ttl: Duration,
    /// Sync-vs-async dispatch thresholds.
    pub thresholds: AsyncThresholds,
    /// Path to the Ghostscript binary used by the compress executor.
    pub ghostscript_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("docsmith"),
            max_file_bytes: 100 * 1024 * 1024,
            max_total_bytes: 256 * 1024 * 1024,
            max_pages: 200,
            job_ttl: Duration::from_secs(10 * 60),
            thresholds: AsyncThresholds {
                bytes: 50 * 1024 * 1024,
                pages: 120,
            },
            ghostscript_path: PathBuf::from("gs"),
        }
    }
}

impl CoreConfig {
    /// Load configuration from `DOCSMITH_*` environment variables, falling
    /// back to the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_root: env_path("DOCSMITH_WORK_ROOT").unwrap_or(defaults.work_root),
            max_file_bytes: env_u64("DOCSMITH_MAX_FILE_BYTES", defaults.max_file_bytes),
            max_total_bytes: env_u64("DOCSMITH_MAX_TOTAL_BYTES", defaults.max_total_bytes),
            max_pages: env_u64("DOCSMITH_MAX_PAGES", u64::from(defaults.max_pages)) as u32,
            job_ttl: Duration::from_secs(
                env_u64("DOCSMITH_JOB_EXPIRE_MINUTES", 10).saturating_mul(60),
            ),
            thresholds: AsyncThresholds {
                bytes: env_u64("DOCSMITH_ASYNC_THRESHOLD_BYTES", defaults.thresholds.bytes),
                pages: env_u64("DOCSMITH_ASYNC_THRESHOLD_PAGES", defaults.thresholds.pages),
            },
            ghostscript_path: env_path("DOCSMITH_GS_PATH").unwrap_or(defaults.ghostscript_path),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

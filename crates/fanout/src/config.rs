//! Pool sizing and environment-driven settings.
//!
//! The host's parallelism is never read implicitly: callers inject a
//! [`Parallelism`] capability, and the processor queries it exactly once when
//! it is built.

use std::env;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Parallelism ──────────────────────────────────────────────────────

/// Reports how many execution units the host can run in parallel.
pub trait Parallelism: Send + Sync {
    fn available(&self) -> usize;
}

/// Asks the operating system via [`std::thread::available_parallelism`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HostParallelism;

impl Parallelism for HostParallelism {
    fn available(&self) -> usize {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4)
    }
}

/// A fixed answer, for tests and for pinning pool sizes in deployments.
#[derive(Debug, Clone, Copy)]
pub struct FixedParallelism(pub usize);

impl Parallelism for FixedParallelism {
    fn available(&self) -> usize {
        self.0
    }
}

/// Default pool size: one unit is left for the orchestrating thread, but a
/// pool never defaults to zero workers.
pub fn default_concurrency(parallelism: &dyn Parallelism) -> usize {
    parallelism.available().saturating_sub(1).max(1)
}

// ── PoolSettings ─────────────────────────────────────────────────────

/// Serializable pool settings, typically read from the environment or TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Number of workers. `None` = available parallelism minus one.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Prefix for worker names (`{prefix}-{index}`).
    #[serde(default = "default_worker_name")]
    pub worker_name: String,
}

fn default_worker_name() -> String {
    "fanout-worker".to_string()
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            concurrency: None,
            worker_name: default_worker_name(),
        }
    }
}

impl PoolSettings {
    /// Build settings from `FANOUT_CONCURRENCY` and `FANOUT_WORKER_NAME`
    /// (call [`load_dotenv`] first). Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            concurrency: env_opt("FANOUT_CONCURRENCY").and_then(|v| v.parse().ok()),
            worker_name: env_opt("FANOUT_WORKER_NAME").unwrap_or_else(default_worker_name),
        }
    }

    /// Resolve the pool size. An explicit `0` is kept as-is.
    pub fn resolved_concurrency(&self, parallelism: &dyn Parallelism) -> usize {
        self.concurrency
            .unwrap_or_else(|| default_concurrency(parallelism))
    }
}

//! Store construction settings.
//!
//! # Responsibility
//! - Carry every value the store needs at construction time.
//! - Keep process-wide naming conventions outside the core.
//!
//! # Invariants
//! - Settings are resolved once by the caller and never re-read implicitly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ASSETS_DIR: &str = "Assets";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Explicit configuration passed to [`crate::Store::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file location.
    pub db_path: PathBuf,
    /// Name recorded by `setup_default`.
    pub default_setup_name: String,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>, default_setup_name: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            default_setup_name: default_setup_name.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Builds the conventional layout for an application name:
    /// `Assets/<name>.db`, with `name` as the default setup name.
    pub fn for_app(name: &str) -> Self {
        let db_path = PathBuf::from(DEFAULT_ASSETS_DIR).join(format!("{name}.db"));
        Self::new(db_path, name)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

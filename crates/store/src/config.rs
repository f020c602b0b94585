use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the SQLite-backed event store.
///
/// `data_dir` is derived from the instance root: paths are not
/// overridable at runtime beyond locating the instance root itself.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub event_retention: Duration,
    pub finding_retention: Duration,
    /// How often the periodic sweeper runs. At least once per hour.
    pub sweep_interval: Duration,
}

impl StoreConfig {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            event_retention: Duration::from_secs(24 * 3600),
            finding_retention: Duration::from_secs(7 * 24 * 3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gatewatch.sqlite3")
    }

    /// `sqlite://` connection string with `create` mode so first-run startup
    /// doesn't require a pre-existing file.
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path().display())
    }
}

//! Root configuration, loaded from a single TOML file (the ambient
//! stack). Every section is `#[serde(default)]` so a config file covering
//! only the fields an operator cares about still parses, and a missing
//! config file falls back to `Default`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration for the `gatewatch` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewatchConfig {
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for GatewatchConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty document parses against all-default config")
    }
}

/// Paths relative to the instance root (not overridable at
/// runtime beyond locating the root itself).
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
    /// Static `location_id -> region_id` table, TOML map of string keys to
    /// region ids (out of scope to build a full static table; loaded if present).
    pub region_table_path: Option<PathBuf>,
    /// Area-effect-capable vehicle type ids, a TOML file with a single
    /// `ids = [...]` array. Falls back to `AreaEffectPlatforms::seed_default`
    /// when absent.
    pub area_effect_platforms_path: Option<PathBuf>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            profiles_dir: default_profiles_dir(),
            region_table_path: None,
            area_effect_platforms_path: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from("./profiles")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    pub queue_id: Option<String>,
    #[serde(default = "default_ttw")]
    pub ttw: u8,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            queue_id: None,
            ttw: default_ttw(),
        }
    }
}

fn default_source_base_url() -> String {
    "https://queue.example-killboard.test/listen.php".to_owned()
}

fn default_ttw() -> u8 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_enrichment_base_url")]
    pub base_url: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_rate_per_second")]
    pub rate_per_second: f64,
    #[serde(default = "default_backlog_capacity")]
    pub backlog_capacity: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: default_enrichment_base_url(),
            concurrency: default_concurrency(),
            rate_per_second: default_rate_per_second(),
            backlog_capacity: default_backlog_capacity(),
        }
    }
}

fn default_enrichment_base_url() -> String {
    "https://killboard.example-killboard.test/api/killID".to_owned()
}

fn default_concurrency() -> usize {
    5
}

fn default_rate_per_second() -> f64 {
    20.0
}

fn default_backlog_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_event_retention_hours")]
    pub event_retention_hours: u64,
    #[serde(default = "default_finding_retention_days")]
    pub finding_retention_days: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_retention_hours: default_event_retention_hours(),
            finding_retention_days: default_finding_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn event_retention(&self) -> Duration {
        Duration::from_secs(self.event_retention_hours * 3600)
    }

    #[must_use]
    pub fn finding_retention(&self) -> Duration {
        Duration::from_secs(self.finding_retention_days * 24 * 3600)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_event_retention_hours() -> u64 {
    24
}

fn default_finding_retention_days() -> u64 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_min_events")]
    pub min_events: usize,
    #[serde(default = "default_area_window_secs")]
    pub area_window_secs: u64,
    #[serde(default = "default_area_min_events")]
    pub area_min_events: usize,
    #[serde(default = "default_force_asymmetry_threshold")]
    pub force_asymmetry_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_secs: default_detector_window_secs(),
            min_events: default_min_events(),
            area_window_secs: default_area_window_secs(),
            area_min_events: default_area_min_events(),
            force_asymmetry_threshold: default_force_asymmetry_threshold(),
        }
    }
}

impl DetectorConfig {
    #[must_use]
    pub fn to_rule_config(&self) -> gatewatch_detector::DetectorConfig {
        gatewatch_detector::DetectorConfig {
            window: Duration::from_secs(self.window_secs),
            min_events: self.min_events,
            area_window: Duration::from_secs(self.area_window_secs),
            area_min_events: self.area_min_events,
            force_asymmetry_threshold: self.force_asymmetry_threshold,
        }
    }
}

fn default_detector_window_secs() -> u64 {
    600
}

fn default_min_events() -> usize {
    3
}

fn default_area_window_secs() -> u64 {
    60
}

fn default_area_min_events() -> usize {
    3
}

fn default_force_asymmetry_threshold() -> f64 {
    5.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackfillConfig {
    #[serde(default = "default_backfill_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_events_per_run")]
    pub max_events_per_run: usize,
    #[serde(default = "default_upstream_retention_hours")]
    pub upstream_retention_hours: u64,
    #[serde(default = "default_backfill_rate_per_second")]
    pub rate_per_second: f64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            base_url: default_backfill_base_url(),
            max_events_per_run: default_max_events_per_run(),
            upstream_retention_hours: default_upstream_retention_hours(),
            rate_per_second: default_backfill_rate_per_second(),
        }
    }
}

impl BackfillConfig {
    #[must_use]
    pub fn upstream_retention(&self) -> Duration {
        Duration::from_secs(self.upstream_retention_hours * 3600)
    }
}

fn default_backfill_base_url() -> String {
    "https://history.example-killboard.test/api/region".to_owned()
}

fn default_max_events_per_run() -> usize {
    500
}

fn default_upstream_retention_hours() -> u64 {
    3
}

fn default_backfill_rate_per_second() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_webhook_rate_per_second")]
    pub rate_per_second: f64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            rate_per_second: default_webhook_rate_per_second(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

fn default_webhook_rate_per_second() -> f64 {
    5.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8088
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses_to_defaults() {
        let config: GatewatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.enrichment.concurrency, 5);
    }

    #[test]
    fn partial_document_only_overrides_named_fields() {
        let toml_str = r#"
            [server]
            port = 9000
        "#;
        let config: GatewatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.detector.min_events, 3);
    }
}

// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for a Stigmergy agent process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Agent identity (role, id, region)
// - Shared store location
// - Per-role tuning (sensor, aggregator, responder, simulator)
// - Supervisor backoff, network and observability settings
//
// Configuration is validated once at startup and is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::agent::{AgentId, AgentRole};

pub const API_VERSION: &str = "stigmergy.dev/v1";
pub const KIND: &str = "NodeConfig";
pub const CONFIG_PATH_ENV: &str = "STIGMERGY_CONFIG_PATH";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "stigmergy.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    /// Node metadata (name, labels, version)
    pub metadata: ManifestMetadata,

    /// Node configuration specification
    pub spec: NodeConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    /// Optional: Configuration version for tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Optional: Labels for categorization and discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Node configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub streams: StreamsConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub responder: ResponderConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Behavior this process runs; required by `run` unless given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,

    /// Stable agent identifier (random `agent-xxxxxxxx` when omitted)
    #[serde(default)]
    pub id: AgentId,

    /// Region partition this agent reads and writes
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            role: None,
            id: AgentId::generate(),
            region: default_region(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" for an embedded store, or the base URL of a store server
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Timeout for non-blocking store calls in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn is_embedded(&self) -> bool {
        self.url == "memory"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_warning_prefix")]
    pub warning_prefix: String,

    #[serde(default = "default_alert_prefix")]
    pub alert_prefix: String,

    /// Entries kept per log (approximate)
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Maximum entries removed by a single trim
    #[serde(default = "default_trim_limit")]
    pub trim_limit: usize,

    /// Maximum entries returned by a single read
    #[serde(default = "default_read_count")]
    pub read_count: usize,

    /// How long a read waits for new entries
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,

    /// Read attempts before a transport error surfaces
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff unit between read attempts
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            warning_prefix: default_warning_prefix(),
            alert_prefix: default_alert_prefix(),
            retention: default_retention(),
            trim_limit: default_trim_limit(),
            read_count: default_read_count(),
            block_ms: default_block_ms(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Initial detection threshold in [0.01, 0.99]
    #[serde(default = "default_sensor_threshold")]
    pub threshold: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How far back neighbor warnings count toward amplification
    #[serde(default = "default_window_ms")]
    pub neighbor_window_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            threshold: default_sensor_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            neighbor_window_ms: default_window_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Fraction of sensors that must report within the window
    #[serde(default = "default_quorum_ratio")]
    pub quorum_ratio: f64,

    #[serde(default = "default_window_ms")]
    pub sliding_window_ms: u64,

    /// Static sensor count; the region registry is consulted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sensors: Option<usize>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            quorum_ratio: default_quorum_ratio(),
            sliding_window_ms: default_window_ms(),
            total_sensors: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_isolation_ms")]
    pub isolation_ms: u64,

    #[serde(default = "default_scan_ms")]
    pub scan_ms: u64,

    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            isolation_ms: default_isolation_ms(),
            scan_ms: default_scan_ms(),
            lock_ttl_ms: default_lock_ttl_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Run the anomaly simulator alongside the configured role
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_simulator_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_lateral_movement_probability")]
    pub lateral_movement_probability: f64,

    #[serde(default = "default_false_positive_probability")]
    pub false_positive_probability: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_simulator_interval_ms(),
            lateral_movement_probability: default_lateral_movement_probability(),
            false_positive_probability: default_false_positive_probability(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Consecutive failures after which manual intervention is flagged
    #[serde(default = "default_intervention_after")]
    pub intervention_after: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            intervention_after: default_intervention_after(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Control API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "compact")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    #[serde(default)]
    pub enabled: bool,

    /// Metrics endpoint port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// Configuration errors. Fatal at startup only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Default value functions
fn default_region() -> String {
    "default-region".to_string()
}

fn default_store_url() -> String {
    "memory".to_string()
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_warning_prefix() -> String {
    "warning_pheromones".to_string()
}

fn default_alert_prefix() -> String {
    "alert_pheromones".to_string()
}

fn default_retention() -> usize {
    500
}

fn default_trim_limit() -> usize {
    100
}

fn default_read_count() -> usize {
    100
}

fn default_block_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_sensor_threshold() -> f64 {
    0.7
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_window_ms() -> u64 {
    30000
}

fn default_quorum_ratio() -> f64 {
    0.7
}

fn default_isolation_ms() -> u64 {
    10000
}

fn default_scan_ms() -> u64 {
    2000
}

fn default_lock_ttl_ms() -> u64 {
    15000
}

fn default_simulator_interval_ms() -> u64 {
    1000
}

fn default_lateral_movement_probability() -> f64 {
    0.05
}

fn default_false_positive_probability() -> f64 {
    0.02
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    30000
}

fn default_intervention_after() -> u32 {
    5
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "stigmergy-node".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Discover configuration file using precedence order
    /// 1. STIGMERGY_CONFIG_PATH environment variable
    /// 2. ./stigmergy-config.yaml (working directory)
    /// 3. ~/.stigmergy/config.yaml (user home)
    /// 4. /etc/stigmergy/config.yaml (Unix only)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./stigmergy-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".stigmergy").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/stigmergy/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Explicit CLI path: fail if missing or invalid
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `STIGMERGY_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparsable values are logged and ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let spec = &mut self.spec;

        if let Some(role) = lookup("STIGMERGY_AGENT_ROLE") {
            match role.parse::<AgentRole>() {
                Ok(role) => spec.agent.role = Some(role),
                Err(e) => tracing::warn!("Ignoring STIGMERGY_AGENT_ROLE: {}", e),
            }
        }
        if let Some(id) = lookup("STIGMERGY_AGENT_ID") {
            spec.agent.id = AgentId::new(id);
        }
        if let Some(region) = lookup("STIGMERGY_REGION") {
            spec.agent.region = region;
        }
        if let Some(url) = lookup("STIGMERGY_STORE_URL") {
            spec.store.url = url;
        }
        if let Some(prefix) = lookup("STIGMERGY_WARNING_PREFIX") {
            spec.streams.warning_prefix = prefix;
        }
        if let Some(prefix) = lookup("STIGMERGY_ALERT_PREFIX") {
            spec.streams.alert_prefix = prefix;
        }

        override_parsed(&lookup, "STIGMERGY_SENSOR_THRESHOLD", &mut spec.sensor.threshold);
        override_parsed(&lookup, "STIGMERGY_SENSOR_POLL_INTERVAL_MS", &mut spec.sensor.poll_interval_ms);
        override_parsed(&lookup, "STIGMERGY_SENSOR_NEIGHBOR_WINDOW_MS", &mut spec.sensor.neighbor_window_ms);

        override_parsed(&lookup, "STIGMERGY_AGGREGATOR_POLL_INTERVAL_MS", &mut spec.aggregator.poll_interval_ms);
        override_parsed(&lookup, "STIGMERGY_AGGREGATOR_QUORUM_RATIO", &mut spec.aggregator.quorum_ratio);
        override_parsed(&lookup, "STIGMERGY_AGGREGATOR_WINDOW_MS", &mut spec.aggregator.sliding_window_ms);
        if let Some(raw) = lookup("STIGMERGY_TOTAL_SENSORS") {
            match raw.parse::<usize>() {
                Ok(total) => spec.aggregator.total_sensors = Some(total),
                Err(_) => tracing::warn!("Ignoring STIGMERGY_TOTAL_SENSORS: '{}' is not a count", raw),
            }
        }

        override_parsed(&lookup, "STIGMERGY_RESPONDER_POLL_INTERVAL_MS", &mut spec.responder.poll_interval_ms);
        override_parsed(&lookup, "STIGMERGY_RESPONDER_ISOLATION_MS", &mut spec.responder.isolation_ms);
        override_parsed(&lookup, "STIGMERGY_RESPONDER_SCAN_MS", &mut spec.responder.scan_ms);
        override_parsed(&lookup, "STIGMERGY_RESPONDER_LOCK_TTL_MS", &mut spec.responder.lock_ttl_ms);

        if let Some(val) = lookup("STIGMERGY_SIMULATOR_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => spec.simulator.enabled = true,
                "false" | "0" | "no" | "off" => spec.simulator.enabled = false,
                _ => tracing::warn!(
                    "Invalid value for STIGMERGY_SIMULATOR_ENABLED: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }
        override_parsed(&lookup, "STIGMERGY_SIMULATOR_INTERVAL_MS", &mut spec.simulator.interval_ms);

        override_parsed(&lookup, "STIGMERGY_PORT", &mut spec.network.port);
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return invalid(format!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version, API_VERSION
            ));
        }

        if self.kind != KIND {
            return invalid(format!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND));
        }

        if self.metadata.name.is_empty() {
            return invalid("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        if spec.agent.id.as_str().is_empty() {
            return invalid("spec.agent.id cannot be empty");
        }
        if spec.agent.region.is_empty() {
            return invalid("spec.agent.region cannot be empty");
        }

        let url = spec.store.url.as_str();
        if url != "memory" && !url.starts_with("http://") && !url.starts_with("https://") {
            return invalid(format!(
                "spec.store.url must be 'memory' or an http(s) URL, got '{}'",
                url
            ));
        }

        if spec.streams.warning_prefix.is_empty() || spec.streams.alert_prefix.is_empty() {
            return invalid("stream prefixes cannot be empty");
        }
        if spec.streams.retention == 0 {
            return invalid("spec.streams.retention must be greater than zero");
        }
        if spec.streams.read_count == 0 {
            return invalid("spec.streams.read_count must be greater than zero");
        }
        if spec.streams.max_retries == 0 {
            return invalid("spec.streams.max_retries must be at least 1");
        }

        if !(0.01..=0.99).contains(&spec.sensor.threshold) {
            return invalid(format!(
                "spec.sensor.threshold must be within [0.01, 0.99], got {}",
                spec.sensor.threshold
            ));
        }
        if !(spec.aggregator.quorum_ratio > 0.0 && spec.aggregator.quorum_ratio <= 1.0) {
            return invalid(format!(
                "spec.aggregator.quorum_ratio must be within (0, 1], got {}",
                spec.aggregator.quorum_ratio
            ));
        }
        if spec.aggregator.total_sensors == Some(0) {
            return invalid("spec.aggregator.total_sensors must be greater than zero when set");
        }

        for (name, value) in [
            ("spec.sensor.poll_interval_ms", spec.sensor.poll_interval_ms),
            ("spec.sensor.neighbor_window_ms", spec.sensor.neighbor_window_ms),
            ("spec.aggregator.poll_interval_ms", spec.aggregator.poll_interval_ms),
            ("spec.aggregator.sliding_window_ms", spec.aggregator.sliding_window_ms),
            ("spec.responder.poll_interval_ms", spec.responder.poll_interval_ms),
            ("spec.responder.lock_ttl_ms", spec.responder.lock_ttl_ms),
            ("spec.simulator.interval_ms", spec.simulator.interval_ms),
            ("spec.supervisor.backoff_base_ms", spec.supervisor.backoff_base_ms),
        ] {
            if value == 0 {
                return invalid(format!("{} must be greater than zero", name));
            }
        }

        if spec.supervisor.backoff_max_ms < spec.supervisor.backoff_base_ms {
            return invalid("spec.supervisor.backoff_max_ms cannot be below backoff_base_ms");
        }

        for (name, p) in [
            ("lateral_movement_probability", spec.simulator.lateral_movement_probability),
            ("false_positive_probability", spec.simulator.false_positive_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("spec.simulator.{} must be within [0, 1]", name));
            }
        }

        Ok(())
    }
}

impl StreamsConfig {
    pub fn block(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

impl ResponderConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }
}

impl SupervisorConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(message.into()))
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.parse::<T>() {
            Ok(value) => {
                tracing::info!("Environment override: {}={}", key, raw);
                *target = value;
            }
            Err(_) => tracing::warn!("Invalid value for {}: '{}'. Ignoring.", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = NodeConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(manifest.spec.agent.id.as_str().starts_with("agent-"));
        assert_eq!(manifest.spec.streams.retention, 500);
        assert_eq!(manifest.spec.aggregator.total_sensors, None);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: stigmergy.dev/v1
kind: NodeConfig
metadata:
  name: edge-7
spec:
  agent:
    role: aggregator
    id: agg-1
    region: eu-west
  aggregator:
    quorum_ratio: 0.5
    total_sensors: 4
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.agent.role, Some(AgentRole::Aggregator));
        assert_eq!(manifest.spec.agent.id.as_str(), "agg-1");
        assert_eq!(manifest.spec.aggregator.quorum_ratio, 0.5);
        assert_eq!(manifest.spec.aggregator.total_sensors, Some(4));
        assert_eq!(manifest.spec.aggregator.sliding_window_ms, 30000);
        assert_eq!(manifest.spec.responder.lock_ttl_ms, 15000);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut manifest = NodeConfigManifest::default();
        manifest.spec.agent.region = "ap-south".to_string();
        manifest.to_yaml_file(&path).unwrap();

        let loaded = NodeConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.agent.region, "ap-south");
        assert_eq!(loaded.spec.agent.id, manifest.spec.agent.id);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = NodeConfigManifest::from_yaml_file("/nonexistent/stigmergy.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let mut manifest = NodeConfigManifest::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("STIGMERGY_AGENT_ROLE", "response"),
            ("STIGMERGY_REGION", "us-east"),
            ("STIGMERGY_TOTAL_SENSORS", "10"),
            ("STIGMERGY_AGGREGATOR_QUORUM_RATIO", "0.8"),
            ("STIGMERGY_SENSOR_THRESHOLD", "not-a-float"),
            ("STIGMERGY_SIMULATOR_ENABLED", "yes"),
        ]);
        manifest.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(manifest.spec.agent.role, Some(AgentRole::Responder));
        assert_eq!(manifest.spec.agent.region, "us-east");
        assert_eq!(manifest.spec.aggregator.total_sensors, Some(10));
        assert_eq!(manifest.spec.aggregator.quorum_ratio, 0.8);
        assert_eq!(manifest.spec.sensor.threshold, 0.7);
        assert!(manifest.spec.simulator.enabled);
    }

    #[test]
    fn test_validation() {
        let mut manifest = NodeConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.aggregator.quorum_ratio = 0.0;
        assert!(manifest.validate().is_err());
        manifest.spec.aggregator.quorum_ratio = 1.0;
        assert!(manifest.validate().is_ok());

        manifest.spec.sensor.threshold = 1.2;
        assert!(manifest.validate().is_err());
        manifest.spec.sensor.threshold = 0.5;

        manifest.spec.store.url = "redis://localhost".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.store.url = "http://127.0.0.1:7400".to_string();
        assert!(manifest.validate().is_ok());

        manifest.spec.responder.poll_interval_ms = 0;
        assert!(matches!(manifest.validate(), Err(ConfigError::Invalid(_))));
        manifest.spec.responder.poll_interval_ms = 5000;

        manifest.spec.aggregator.total_sensors = Some(0);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_nan_quorum_ratio_is_rejected() {
        let mut manifest = NodeConfigManifest::default();
        manifest.spec.aggregator.quorum_ratio = f64::NAN;
        assert!(matches!(manifest.validate(), Err(ConfigError::Invalid(_))));

        let mut from_env = NodeConfigManifest::default();
        from_env.apply_overrides_from(|key| {
            (key == "STIGMERGY_AGGREGATOR_QUORUM_RATIO").then(|| "NaN".to_string())
        });
        assert!(from_env.spec.aggregator.quorum_ratio.is_nan());
        assert!(from_env.validate().is_err());

        let yaml = r#"
apiVersion: stigmergy.dev/v1
kind: NodeConfig
metadata:
  name: nan-ratio
spec:
  aggregator:
    quorum_ratio: .nan
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert!(manifest.validate().is_err());
    }
}

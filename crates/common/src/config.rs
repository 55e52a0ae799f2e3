use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::category::PerCategory;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub pushgateway: Option<PushgatewayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: Vec<String>,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_admin_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_admin_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_name")]
    pub name: String,
    pub servers: Vec<UpstreamServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamServer {
    pub addr: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

/// Where the caller identity is read from.
///
/// The header is expected to be set by a trusted proxy in front of this one;
/// its value is not re-validated beyond IP parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_header")]
    pub header: String,
    /// Use the socket peer address when the header is absent.
    #[serde(default)]
    pub fallback_to_peer_addr: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            header: default_identity_header(),
            fallback_to_peer_addr: false,
        }
    }
}

/// Thresholds of the blocking policy. A zero value disables its gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Inactivity after which a block is forgiven and the record evicted.
    #[serde(default = "default_reset_after_minutes")]
    pub reset_after_minutes: u64,
    /// Minimum observed span before an identity can be blocked.
    #[serde(default = "default_min_time_seconds")]
    pub min_time_seconds: u64,
    #[serde(default)]
    pub min_requests: MinRequestsConfig,
    #[serde(default)]
    pub min_requests_per_minute: MinRequestsPerMinuteConfig,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            reset_after_minutes: default_reset_after_minutes(),
            min_time_seconds: default_min_time_seconds(),
            min_requests: MinRequestsConfig::default(),
            min_requests_per_minute: MinRequestsPerMinuteConfig::default(),
        }
    }
}

impl BlockingConfig {
    pub fn reset_after(&self) -> Duration {
        Duration::from_secs(self.reset_after_minutes.saturating_mul(60))
    }

    pub fn min_time(&self) -> Duration {
        Duration::from_secs(self.min_time_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinRequestsConfig {
    #[serde(default = "default_min_requests_auth_enumeration")]
    pub auth_enumeration: u64,
    #[serde(default = "default_min_requests_crawler")]
    pub crawler: u64,
    #[serde(default = "default_min_requests_spam")]
    pub spam: u64,
}

impl Default for MinRequestsConfig {
    fn default() -> Self {
        Self {
            auth_enumeration: default_min_requests_auth_enumeration(),
            crawler: default_min_requests_crawler(),
            spam: default_min_requests_spam(),
        }
    }
}

impl MinRequestsConfig {
    pub fn to_table(&self) -> PerCategory<u64> {
        PerCategory::new(self.auth_enumeration, self.spam, self.crawler)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinRequestsPerMinuteConfig {
    #[serde(default)]
    pub auth_enumeration: f64,
    #[serde(default)]
    pub crawler: f64,
    #[serde(default = "default_min_rpm_spam")]
    pub spam: f64,
}

impl Default for MinRequestsPerMinuteConfig {
    fn default() -> Self {
        Self {
            auth_enumeration: 0.0,
            crawler: 0.0,
            spam: default_min_rpm_spam(),
        }
    }
}

impl MinRequestsPerMinuteConfig {
    pub fn to_table(&self) -> PerCategory<f64> {
        PerCategory::new(self.auth_enumeration, self.spam, self.crawler)
    }
}

/// Request classifier settings.
///
/// The signature lists default to the built-in tables of the classifier;
/// setting one here replaces the corresponding table entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Classify loopback, link-local and private addresses too.
    #[serde(default)]
    pub include_private_ips: bool,
    #[serde(default)]
    pub auth_headers: Option<Vec<String>>,
    #[serde(default)]
    pub auth_query_params: Option<Vec<String>>,
    #[serde(default)]
    pub crawler_signatures: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// A single readers-writer lock over all records.
    #[default]
    Locked,
    /// Records sharded by identity hash.
    Sharded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_eviction_interval_ms")]
    pub eviction_interval_ms: u64,
    /// Offset from the eviction interval so the two tasks rarely contend.
    #[serde(default = "default_export_interval_ms")]
    pub export_interval_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            eviction_interval_ms: default_eviction_interval_ms(),
            export_interval_ms: default_export_interval_ms(),
        }
    }
}

impl MaintenanceConfig {
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.export_interval_ms)
    }
}

/// Prometheus Pushgateway sink for aggregate metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushgatewayConfig {
    pub address: String,
    #[serde(default = "default_push_job")]
    pub job: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default = "default_push_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_metrics_namespace")]
    pub namespace: String,
}

impl PushgatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_upstream_name() -> String {
    "backend".to_string()
}
fn default_weight() -> u32 {
    1
}
fn default_identity_header() -> String {
    "x-real-ip".to_string()
}
fn default_reset_after_minutes() -> u64 {
    15
}
fn default_min_time_seconds() -> u64 {
    5
}
fn default_min_requests_auth_enumeration() -> u64 {
    5
}
fn default_min_requests_crawler() -> u64 {
    20
}
fn default_min_requests_spam() -> u64 {
    50
}
fn default_min_rpm_spam() -> f64 {
    60.0
}
fn default_eviction_interval_ms() -> u64 {
    60_000
}
fn default_export_interval_ms() -> u64 {
    60_299
}
fn default_push_job() -> String {
    "malblock".to_string()
}
fn default_push_timeout_secs() -> u64 {
    20
}
pub fn default_metrics_namespace() -> String {
    "malblock".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML document.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen must have at least one address");
        }

        if self.upstream.servers.is_empty() {
            anyhow::bail!("upstream '{}' has no servers", self.upstream.name);
        }

        if self.identity.header.trim().is_empty() {
            anyhow::bail!("identity.header must not be empty");
        }

        for (category, rate) in self.blocking.min_requests_per_minute.to_table().iter() {
            if !rate.is_finite() || rate < 0.0 {
                anyhow::bail!(
                    "blocking.min_requests_per_minute.{} must be a non-negative number, got {}",
                    category,
                    rate
                );
            }
        }

        if self.maintenance.eviction_interval_ms == 0 || self.maintenance.export_interval_ms == 0
        {
            anyhow::bail!("maintenance intervals must be greater than zero");
        }

        if let Some(ref push) = self.pushgateway {
            if !(push.address.starts_with("http://") || push.address.starts_with("https://")) {
                anyhow::bail!(
                    "pushgateway.address must start with http:// or https://, got '{}'",
                    push.address
                );
            }
            if push.job.trim().is_empty() {
                anyhow::bail!("pushgateway.job must not be empty");
            }
            if push.timeout_secs == 0 {
                anyhow::bail!("pushgateway.timeout_secs must be greater than zero");
            }
        }

        tracing::debug!(
            backend = ?self.store.backend,
            include_private_ips = self.scanner.include_private_ips,
            pushgateway = self.pushgateway.is_some(),
            "configuration validated"
        );

        Ok(())
    }
}

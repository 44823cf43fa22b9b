//! # Agent Configuration
//!
//! All settings have defaults from [`crate::constants`] and can be overridden
//! via environment variables, populated from a ConfigMap in the deployment.

use crate::constants::{
    DEFAULT_CENTRAL_GATEWAY_URL, DEFAULT_CERT_REFRESH_INTERVAL_SECS,
    DEFAULT_CLUSTER_CERTIFICATES_SECRET, DEFAULT_GATEWAY_PORT, DEFAULT_METRICS_PORT,
    DEFAULT_NAMESPACE, DEFAULT_PROXY_PORT, DEFAULT_SYNC_INTERVAL_SECS,
    DEFAULT_UPLOAD_SERVICE_URL,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Anything other than `text` logs JSON
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Integration namespace for secrets, access services and Istio objects
    pub namespace: String,
    /// Target port of the per-application gateway
    pub gateway_port: i32,
    pub central_gateway_url: String,
    /// Rafter upload service
    pub upload_service_url: String,
    pub proxy_port: u16,
    /// Skip Director certificate verification in the proxy
    pub proxy_insecure_skip_verify: bool,
    /// Director endpoint the proxy forwards to. The proxy stays unconfigured
    /// while unset.
    pub director_url: Option<String>,
    /// Client certificate secret as `namespace/name`
    pub cluster_certificates_secret: String,
    pub cert_refresh_interval_secs: u64,
    pub sync_interval_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    pub log_format: LogFormat,
    /// Written to `skipVerify` of every Application
    pub skip_apps_tls_verify: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            gateway_port: DEFAULT_GATEWAY_PORT,
            central_gateway_url: DEFAULT_CENTRAL_GATEWAY_URL.to_string(),
            upload_service_url: DEFAULT_UPLOAD_SERVICE_URL.to_string(),
            proxy_port: DEFAULT_PROXY_PORT,
            proxy_insecure_skip_verify: false,
            director_url: None,
            cluster_certificates_secret: DEFAULT_CLUSTER_CERTIFICATES_SECRET.to_string(),
            cert_refresh_interval_secs: DEFAULT_CERT_REFRESH_INTERVAL_SECS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: LogFormat::Json,
            skip_apps_tls_verify: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            namespace: env_var_or_default_str("NAMESPACE", DEFAULT_NAMESPACE),
            gateway_port: env_var_or_default("GATEWAY_PORT", DEFAULT_GATEWAY_PORT),
            central_gateway_url: env_var_or_default_str(
                "CENTRAL_GATEWAY_URL",
                DEFAULT_CENTRAL_GATEWAY_URL,
            ),
            upload_service_url: env_var_or_default_str(
                "UPLOAD_SERVICE_URL",
                DEFAULT_UPLOAD_SERVICE_URL,
            ),
            proxy_port: env_var_or_default("PROXY_PORT", DEFAULT_PROXY_PORT),
            proxy_insecure_skip_verify: env_var_or_default_bool("PROXY_INSECURE_SKIP_VERIFY", false),
            director_url: std::env::var("DIRECTOR_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            cluster_certificates_secret: env_var_or_default_str(
                "CLUSTER_CERTIFICATES_SECRET",
                DEFAULT_CLUSTER_CERTIFICATES_SECRET,
            ),
            cert_refresh_interval_secs: env_var_or_default(
                "CERT_REFRESH_INTERVAL_SECS",
                DEFAULT_CERT_REFRESH_INTERVAL_SECS,
            ),
            sync_interval_secs: env_var_or_default("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_format: LogFormat::parse(&env_var_or_default_str("LOG_FORMAT", "json")),
            skip_apps_tls_verify: env_var_or_default_bool("SKIP_APPS_TLS_VERIFY", false),
        }
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    #[must_use]
    pub fn cert_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cert_refresh_interval_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| {
            matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
        })
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

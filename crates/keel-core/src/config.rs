//! Agent configuration.
//!
//! Configuration is read from the environment with sensible defaults. The
//! cluster field starts out as whatever the operator configured (possibly
//! nothing) and is replaced by the resolved cluster once registration succeeds.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::ids::ClusterRef;

/// Name of the cluster that is bootstrapped when no cluster is configured.
pub const DEFAULT_CLUSTER_NAME: &str = "default";

/// Configuration for the container instance agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Cluster to register into. `None` bootstraps [`DEFAULT_CLUSTER_NAME`].
    #[serde(default)]
    pub cluster: Option<ClusterRef>,

    /// Control plane API endpoint. Derived from the region when unset.
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Region the control plane lives in.
    #[serde(default = "AgentConfig::default_region")]
    pub region: String,

    /// Host ports that tasks may never bind.
    #[serde(default = "AgentConfig::default_reserved_ports")]
    pub reserved_ports: Vec<u16>,

    /// Base URL of the instance metadata service.
    #[serde(default = "AgentConfig::default_metadata_endpoint")]
    pub metadata_endpoint: String,

    /// Timeout applied to every control plane request, in seconds.
    #[serde(default = "AgentConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Deregister the container instance when the agent shuts down.
    #[serde(default)]
    pub deregister_on_shutdown: bool,

    /// Skip TLS certificate verification on control plane requests.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl AgentConfig {
    fn default_region() -> String {
        "us-east-1".to_string()
    }

    fn default_reserved_ports() -> Vec<u16> {
        vec![22, 2375, 2376, 51678]
    }

    fn default_metadata_endpoint() -> String {
        "http://169.254.169.254/latest".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Load configuration from `KEEL_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using an arbitrary variable lookup.
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("KEEL_CLUSTER") {
            // An empty value is the same as not configuring a cluster at all.
            config.cluster = if val.is_empty() {
                None
            } else {
                ClusterRef::new(val).ok()
            };
        }
        if let Some(val) = lookup("KEEL_API_ENDPOINT") {
            if !val.is_empty() {
                config.api_endpoint = Some(val);
            }
        }
        if let Some(val) = lookup("KEEL_REGION").or_else(|| lookup("AWS_REGION")) {
            if !val.is_empty() {
                config.region = val;
            }
        }
        if let Some(val) = lookup("KEEL_RESERVED_PORTS") {
            match parse_ports(&val) {
                Ok(ports) => config.reserved_ports = ports,
                Err(bad) => {
                    tracing::warn!(value = %bad, "Ignoring invalid KEEL_RESERVED_PORTS entry");
                }
            }
        }
        if let Some(val) = lookup("KEEL_METADATA_ENDPOINT") {
            config.metadata_endpoint = val;
        }
        if let Some(val) = lookup("KEEL_REQUEST_TIMEOUT_SECONDS") {
            match val.parse() {
                Ok(n) => config.request_timeout_seconds = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Ignoring invalid KEEL_REQUEST_TIMEOUT_SECONDS");
                }
            }
        }
        if let Some(val) = lookup("KEEL_DEREGISTER_ON_SHUTDOWN") {
            config.deregister_on_shutdown = parse_flag(&val);
        }
        if let Some(val) = lookup("KEEL_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = parse_flag(&val);
        }

        config
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` if the configured cluster is blank, the
    /// request timeout is zero or the metadata endpoint is blank.
    pub fn validate(&self) -> Result<()> {
        if let Some(cluster) = &self.cluster {
            if cluster.as_str().trim().is_empty() {
                return Err(CoreError::Config("cluster must not be blank".to_string()));
            }
        }
        if self.request_timeout_seconds == 0 {
            return Err(CoreError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        if self.metadata_endpoint.trim().is_empty() {
            return Err(CoreError::Config(
                "metadata endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the configured cluster with the one registration resolved.
    #[must_use]
    pub fn with_cluster(mut self, cluster: ClusterRef) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// The control plane endpoint URL.
    #[must_use]
    pub fn api_url(&self) -> String {
        self.api_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://ecs.{}.amazonaws.com", self.region))
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cluster: None,
            api_endpoint: None,
            region: Self::default_region(),
            reserved_ports: Self::default_reserved_ports(),
            metadata_endpoint: Self::default_metadata_endpoint(),
            request_timeout_seconds: Self::default_request_timeout(),
            deregister_on_shutdown: false,
            accept_invalid_certs: false,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_ports(value: &str) -> std::result::Result<Vec<u16>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>().map_err(|_| s.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = AgentConfig::default();
        assert!(config.cluster.is_none());
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.reserved_ports, vec![22, 2375, 2376, 51678]);
        assert_eq!(config.api_url(), "https://ecs.us-east-1.amazonaws.com");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn empty_cluster_means_default_bootstrap() {
        let config = AgentConfig::from_lookup(lookup(&[("KEEL_CLUSTER", "")]));
        assert!(config.cluster.is_none());
    }

    #[test]
    fn blank_cluster_is_a_config_error() {
        let config = AgentConfig::from_lookup(lookup(&[("KEEL_CLUSTER", "   ")]));
        assert!(config.cluster.is_some());
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn certificate_checks_are_on_by_default() {
        assert!(!AgentConfig::default().accept_invalid_certs);

        let config = AgentConfig::from_lookup(lookup(&[("KEEL_ACCEPT_INVALID_CERTS", "true")]));
        assert!(config.accept_invalid_certs);

        let config = AgentConfig::from_lookup(lookup(&[("KEEL_ACCEPT_INVALID_CERTS", "no")]));
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn env_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("KEEL_CLUSTER", "prod"),
            ("AWS_REGION", "eu-west-1"),
            ("KEEL_RESERVED_PORTS", "22, 8080"),
            ("KEEL_REQUEST_TIMEOUT_SECONDS", "5"),
            ("KEEL_DEREGISTER_ON_SHUTDOWN", "true"),
        ]));
        assert_eq!(config.cluster.unwrap().as_str(), "prod");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.reserved_ports, vec![22, 8080]);
        assert_eq!(config.request_timeout_seconds, 5);
        assert!(config.deregister_on_shutdown);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("KEEL_RESERVED_PORTS", "22,not-a-port"),
            ("KEEL_REQUEST_TIMEOUT_SECONDS", "soon"),
        ]));
        assert_eq!(config.reserved_ports, vec![22, 2375, 2376, 51678]);
        assert_eq!(config.request_timeout_seconds, 30);
    }

    #[test]
    fn explicit_endpoint_wins_over_region() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("KEEL_API_ENDPOINT", "http://localhost:9000"),
            ("KEEL_REGION", "ap-south-1"),
        ]));
        assert_eq!(config.api_url(), "http://localhost:9000");
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = AgentConfig {
            request_timeout_seconds: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn with_cluster_replaces_configured_value() {
        let resolved = ClusterRef::new("default").unwrap();
        let config = AgentConfig::default().with_cluster(resolved.clone());
        assert_eq!(config.cluster, Some(resolved));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: AgentConfig = serde_json::from_str(r#"{"cluster": "staging"}"#).unwrap();
        assert_eq!(config.cluster.unwrap().as_str(), "staging");
        assert_eq!(config.metadata_endpoint, "http://169.254.169.254/latest");
    }
}

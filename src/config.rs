use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration, loaded from a YAML file.
///
/// Cluster connectivity itself (kubeconfig / in-cluster env) is resolved by
/// `kube::Client` the usual way and is deliberately not part of this file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub cluster: ClusterConfig,
    pub edge: EdgeConfig,
    /// Directory inside every workload container that holds the project files.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
    /// Timeout applied to every one-shot remote call (exec, edge shell).
    /// Long-lived terminal streams are exempt.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// Namespace all workload resources are created in.
    pub namespace: String,
    /// Value of the `env` label stamped on every created resource.
    pub env_label: String,
    /// NodePort scan range, `[min, max)`.
    pub node_port_min: i32,
    pub node_port_max: i32,
}

/// The edge host runs the public nginx that fronts workload subdomains.
/// It is reached over `ssh` with key-based auth.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EdgeConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    /// Private key passed as `ssh -i`; falls back to the ambient ssh agent.
    pub identity_file: Option<PathBuf>,
    /// Public apex domain, e.g. `pair-coding.site`.
    pub domain: String,
    /// Prepended to the workload name to form the subdomain, e.g. `proj-`.
    pub subdomain_prefix: String,
    /// Address nginx proxies to — a cluster node reachable from the edge host.
    pub upstream_host: String,
    #[serde(default = "default_sites_available")]
    pub sites_available: String,
    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: String,
}

fn default_workspace_root() -> String {
    "/app".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

fn default_ssh_port() -> u16 {
    22
}

fn default_sites_available() -> String {
    "/etc/nginx/sites-available".to_string()
}

fn default_sites_enabled() -> String {
    "/etc/nginx/sites-enabled".to_string()
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

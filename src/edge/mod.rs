//! Remote administrative shell on the edge host, plus the nginx provisioner
//! built on top of it.

pub mod nginx;

pub use nginx::NginxProvisioner;

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::EdgeConfig;
use crate::error::{Error, Result};

/// One remote command round-trip on the edge host. Narrow on purpose: the
/// provisioner composes everything it needs from single commands, and tests
/// substitute a recording stub.
#[async_trait]
pub trait EdgeShell: Send + Sync {
    async fn run(&self, command: &str) -> Result<String>;
}

/// `EdgeShell` that spawns the system `ssh` client per command.
///
/// Auth is key-based (`identity_file`, or whatever the ambient agent offers);
/// `BatchMode=yes` keeps a missing key from hanging on a password prompt.
pub struct SshShell {
    host: String,
    port: u16,
    user: String,
    identity_file: Option<std::path::PathBuf>,
    timeout: Duration,
}

impl SshShell {
    pub fn new(edge: &EdgeConfig, timeout: Duration) -> Self {
        Self {
            host: edge.host.clone(),
            port: edge.port,
            user: edge.user.clone(),
            identity_file: edge.identity_file.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl EdgeShell for SshShell {
    async fn run(&self, command: &str) -> Result<String> {
        let ssh = which::which("ssh")
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "ssh".to_string());

        let mut cmd = Command::new(&ssh);
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("BatchMode=yes");

        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }

        cmd.arg(format!("{}@{}", self.user, self.host)).arg(command);

        log::debug!("edge: ssh {}@{} {command}", self.user, self.host);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(|e| Error::Edge(format!("failed to spawn ssh: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Edge(format!(
                "remote command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

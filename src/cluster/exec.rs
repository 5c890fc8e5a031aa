use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::AttachParams;
use kube::{Api, Client};
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};

/// Seam for running one shell command inside a workload and capturing its
/// output. The filesystem service is written against this trait so it can be
/// tested with a scripted stub instead of a cluster.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` under `sh -c` in the workload's running pod and returns
    /// trimmed stdout. A non-empty stderr is a failure (see [`classify_stderr`]).
    async fn run(&self, workload: &str, command: &str) -> Result<String>;
}

/// `CommandRunner` backed by the cluster's exec subresource.
///
/// Exactly one attempt per call, no retries — callers decide whether a retry
/// makes sense. Completion is the exec channel closing, not exit-code
/// inspection, which matches how `kubectl exec` behaves for `sh -c`.
pub struct ClusterExec {
    client: Client,
    namespace: String,
    timeout: Duration,
}

impl ClusterExec {
    pub fn new(client: Client, namespace: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            timeout,
        }
    }

    async fn exec_once(&self, workload: &str, command: &str) -> Result<String> {
        let pod_name = super::running_pod(&self.client, &self.namespace, workload).await?;
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);

        log::debug!("exec: pod={pod_name} command={command}");

        let mut attached = pods
            .exec(
                &pod_name,
                vec!["sh", "-c", command],
                &AttachParams::default().stdout(true).stderr(true),
            )
            .await?;

        // Drain both streams concurrently so neither side can stall the
        // other when its buffer fills.
        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let (stdout_buf, stderr_buf) = tokio::join!(drain(stdout), drain(stderr));

        // Block until the channel closes; captured buffers are complete after.
        let _ = attached.join().await;

        let stderr = String::from_utf8_lossy(&stderr_buf);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            log::warn!("exec: pod={pod_name} stderr={stderr}");
            return Err(classify_stderr(stderr));
        }

        Ok(String::from_utf8_lossy(&stdout_buf).trim().to_string())
    }
}

#[async_trait]
impl CommandRunner for ClusterExec {
    async fn run(&self, workload: &str, command: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.exec_once(workload, command))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}

async fn drain(stream: Option<impl tokio::io::AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    buf
}

/// Maps well-known stderr fragments onto the error taxonomy so higher layers
/// can answer the client with a precise code; anything unrecognized is a
/// generic command failure carrying the raw text for the server log.
pub(crate) fn classify_stderr(stderr: &str) -> Error {
    if stderr.contains("No such file or directory") {
        Error::PathNotFound
    } else if stderr.contains("Is a directory") || stderr.contains("Not a directory") {
        Error::InvalidType
    } else if stderr.contains("Permission denied") {
        Error::PermissionDenied
    } else if stderr.contains("cannot remove") || stderr.contains("failed to") {
        Error::FileOperation
    } else {
        Error::CommandFailed(stderr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_stderr_fragments() {
        assert!(matches!(
            classify_stderr("ls: /app/nope: No such file or directory"),
            Error::PathNotFound
        ));
        assert!(matches!(
            classify_stderr("cat: /app/src: Is a directory"),
            Error::InvalidType
        ));
        assert!(matches!(
            classify_stderr("touch: /app/x: Permission denied"),
            Error::PermissionDenied
        ));
        assert!(matches!(
            classify_stderr("rm: cannot remove '/app/x': Directory not empty"),
            Error::FileOperation
        ));
    }

    #[test]
    fn unknown_stderr_is_generic_failure() {
        match classify_stderr("sh: limit exceeded") {
            Error::CommandFailed(text) => assert_eq!(text, "sh: limit exceeded"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}

//! Everything that talks to the Kubernetes API: one-shot command execution,
//! NodePort allocation, and workload resource lifecycle.

pub mod exec;
pub mod ports;
pub mod workloads;

pub use exec::{ClusterExec, CommandRunner};
pub use ports::PortAllocator;
pub use workloads::WorkloadManager;

use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};

use crate::error::{Error, Result};
use crate::models::LabelKey;

/// Returns the name of the first running pod of a workload.
///
/// Workloads run as single-replica deployments, so "first" is normally "only";
/// when no pod has reached Running yet this fails rather than exec'ing into a
/// pod that cannot answer.
pub(crate) async fn running_pod(client: &Client, namespace: &str, workload: &str) -> Result<String> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let selector = format!("{}={workload}", LabelKey::DeploymentName.as_str());
    let list = pods.list(&ListParams::default().labels(&selector)).await?;

    list.items
        .iter()
        .find(|pod| {
            pod.status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                == Some("Running")
        })
        .map(|pod| pod.name_any())
        .ok_or_else(|| Error::NoRunningInstance(workload.to_string()))
}

use serde::{Deserialize, Serialize};

/// Label keys stamped on every cluster resource a workload owns.
/// Bulk deletion selects on these instead of tracking resource names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKey {
    Env,
    GroupId,
    DeploymentName,
}

impl LabelKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelKey::Env => "env",
            LabelKey::GroupId => "groupId",
            LabelKey::DeploymentName => "deploymentName",
        }
    }
}

/// Hard per-workload resource quota, passed through to the cluster verbatim.
/// Values use Kubernetes quantity syntax (`500m`, `512Mi`, `1Gi`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
}

/// Everything needed to create a workload. Image/quota validation happens
/// upstream (project store); this layer passes the values through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    pub group_id: i32,
    pub project_name: String,
    /// Full image reference, registry included.
    pub image: String,
    pub quota: ResourceQuota,
    /// Port the container listens on; also the service port.
    pub container_port: i32,
}

/// A provisioned workload: the record handed back to the project store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// Join key across compute/storage/network resources and the label
    /// selector used for bulk deletion.
    pub name: String,
    pub group_id: i32,
    pub image: String,
    pub quota: ResourceQuota,
    pub container_port: i32,
    /// Externally bound NodePort.
    pub node_port: i32,
    /// Subdomain served by the edge proxy.
    pub subdomain: String,
}

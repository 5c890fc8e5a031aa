//! Composes workload creation end to end: unique name → NodePort allocation →
//! cluster resources → edge proxy; and the reverse for teardown.

use crate::cluster::{PortAllocator, WorkloadManager};
use crate::edge::NginxProvisioner;
use crate::error::Result;
use crate::models::{LabelKey, Workload, WorkloadSpec};

pub struct Provisioner {
    workloads: WorkloadManager,
    ports: PortAllocator,
    nginx: NginxProvisioner,
}

impl Provisioner {
    pub fn new(workloads: WorkloadManager, ports: PortAllocator, nginx: NginxProvisioner) -> Self {
        Self {
            workloads,
            ports,
            nginx,
        }
    }

    /// Creates the full resource set for a project workload and returns the
    /// assembled record for the project store.
    ///
    /// On any failure after resource creation has started, a best-effort
    /// delete-by-label compensates for whatever was already created;
    /// compensation errors are logged and swallowed, the original error
    /// propagates.
    pub async fn create_workload(&self, spec: &WorkloadSpec) -> Result<Workload> {
        let name = self.workloads.unique_name(&spec.project_name).await?;
        let node_port = self.ports.allocate().await?;

        log::info!(
            "provision: creating workload {name} (group {}) on port {node_port}",
            spec.group_id
        );

        if let Err(e) = self.workloads.create(spec, &name, node_port).await {
            log::error!("provision: creating {name} failed: {e}");
            self.compensate(&name).await;
            return Err(e);
        }

        let subdomain = match self.nginx.provision(&name, node_port).await {
            Ok(subdomain) => subdomain,
            Err(e) => {
                log::error!("provision: edge proxy for {name} failed: {e}");
                self.compensate(&name).await;
                return Err(e);
            }
        };

        Ok(Workload {
            name,
            group_id: spec.group_id,
            image: spec.image.clone(),
            quota: spec.quota.clone(),
            container_port: spec.container_port,
            node_port,
            subdomain,
        })
    }

    /// Tears down a workload: bulk delete by name label, then drop the edge
    /// proxy config for its subdomain.
    pub async fn destroy_workload(&self, workload_name: &str) -> Result<()> {
        self.workloads
            .delete_by_label(LabelKey::DeploymentName, workload_name)
            .await?;
        self.nginx
            .deprovision(&self.nginx.subdomain(workload_name))
            .await
    }

    /// Removes every resource a group owns, across all its workloads.
    pub async fn destroy_group(&self, group_id: i32) -> Result<()> {
        self.workloads
            .delete_by_label(LabelKey::GroupId, &group_id.to_string())
            .await
    }

    async fn compensate(&self, name: &str) {
        if let Err(e) = self
            .workloads
            .delete_by_label(LabelKey::DeploymentName, name)
            .await
        {
            log::warn!("provision: compensating delete for {name} failed: {e}");
        }
    }
}

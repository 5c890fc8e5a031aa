use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HostPathVolumeSource, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PersistentVolumeSpec, PodSpec,
    PodTemplateSpec, ResourceRequirements, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use rand::Rng;

use crate::error::{Error, Result};
use crate::models::{LabelKey, WorkloadSpec};

/// Creates and destroys the full resource set of one workload: a hostPath
/// PersistentVolume, its claim, a single-replica Deployment, and a NodePort
/// Service. All four carry the same `env` / `groupId` / `deploymentName`
/// labels, so teardown is a label-selector bulk delete — no local ledger of
/// resource names.
pub struct WorkloadManager {
    client: Client,
    namespace: String,
    env_label: String,
    workspace_root: String,
}

impl WorkloadManager {
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        env_label: impl Into<String>,
        workspace_root: impl Into<String>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            env_label: env_label.into(),
            workspace_root: workspace_root.into(),
        }
    }

    /// `<project>-<4 random lowercase letters>`, regenerated until no
    /// deployment of that name exists.
    pub async fn unique_name(&self, project_name: &str) -> Result<String> {
        loop {
            let name = format!("{project_name}-{}", random_suffix());
            if !self.exists(&name).await? {
                return Ok(name);
            }
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(deployments.get_opt(name).await?.is_some())
    }

    /// Creates the four resources in dependency order. Each is one cluster
    /// API call; any failure aborts the sequence and propagates. Rollback of
    /// earlier steps is the caller's concern (see `provision::Provisioner`).
    pub async fn create(&self, spec: &WorkloadSpec, name: &str, node_port: i32) -> Result<()> {
        let labels = self.labels(spec.group_id, name);

        let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
        volumes
            .create(
                &PostParams::default(),
                &build_volume(name, &labels, &spec.quota.storage),
            )
            .await?;
        log::info!("workloads: created volume {name}-pv");

        let claims: Api<PersistentVolumeClaim> =
            Api::namespaced(self.client.clone(), &self.namespace);
        claims
            .create(
                &PostParams::default(),
                &build_claim(name, &self.namespace, &labels, &spec.quota.storage),
            )
            .await?;
        log::info!("workloads: created claim {name}-pvc");

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        deployments
            .create(
                &PostParams::default(),
                &build_deployment(name, &self.namespace, &labels, spec, &self.workspace_root),
            )
            .await?;
        log::info!("workloads: created deployment {name}");

        let services: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        services
            .create(
                &PostParams::default(),
                &build_service(name, &self.namespace, &labels, spec.container_port, node_port),
            )
            .await?;
        log::info!("workloads: created service {name}-service nodePort={node_port}");

        Ok(())
    }

    /// Fire-and-forget bulk delete of every resource matching `key=value`.
    /// Used both for teardown by workload name and for group-wide cleanup.
    pub async fn delete_by_label(&self, key: LabelKey, value: &str) -> Result<()> {
        let selector = format!("{}={value}", key.as_str());
        let lp = ListParams::default().labels(&selector);
        let dp = DeleteParams::default();

        log::info!("workloads: deleting resources with {selector}");

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        deployments.delete_collection(&dp, &lp).await?;

        let services: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        services.delete_collection(&dp, &lp).await?;

        let claims: Api<PersistentVolumeClaim> =
            Api::namespaced(self.client.clone(), &self.namespace);
        claims.delete_collection(&dp, &lp).await?;

        let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
        volumes.delete_collection(&dp, &lp).await?;

        Ok(())
    }

    /// Sets the replica count of a workload's deployment. Projects are parked
    /// at 0 replicas when idle and woken with 1.
    pub async fn scale(&self, name: &str, replicas: i32) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);

        if deployments.get_opt(name).await?.is_none() {
            return Err(Error::WorkloadNotFound(name.to_string()));
        }

        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        deployments
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        log::info!("workloads: scaled {name} to {replicas} replica(s)");
        Ok(())
    }

    fn labels(&self, group_id: i32, name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LabelKey::Env.as_str().to_string(), self.env_label.clone()),
            (LabelKey::GroupId.as_str().to_string(), group_id.to_string()),
            (LabelKey::DeploymentName.as_str().to_string(), name.to_string()),
        ])
    }
}

// ── resource builders ─────────────────────────────────────────────────────────

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..4).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

fn metadata(name: String, namespace: Option<&str>, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: namespace.map(str::to_string),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Selector shared by the deployment, its pod template, and the service.
fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(LabelKey::DeploymentName.as_str().to_string(), name.to_string())])
}

fn build_volume(
    name: &str,
    labels: &BTreeMap<String, String>,
    storage: &str,
) -> PersistentVolume {
    PersistentVolume {
        metadata: metadata(format!("{name}-pv"), None, labels),
        spec: Some(PersistentVolumeSpec {
            capacity: Some(BTreeMap::from([(
                "storage".to_string(),
                Quantity(storage.to_string()),
            )])),
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            persistent_volume_reclaim_policy: Some("Delete".to_string()),
            // One StorageClass per workload binds the claim to exactly this volume.
            storage_class_name: Some(name.to_string()),
            host_path: Some(HostPathVolumeSource {
                path: format!("/mnt/data/{name}"),
                type_: Some("DirectoryOrCreate".to_string()),
            }),
            ..Default::default()
        }),
        status: None,
    }
}

fn build_claim(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    storage: &str,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: metadata(format!("{name}-pvc"), Some(namespace), labels),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: Some(name.to_string()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

fn build_deployment(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    spec: &WorkloadSpec,
    workspace_root: &str,
) -> Deployment {
    let container = Container {
        name: name.to_string(),
        image: Some(spec.image.clone()),
        resources: Some(ResourceRequirements {
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(spec.quota.cpu.clone())),
                ("memory".to_string(), Quantity(spec.quota.memory.clone())),
            ])),
            ..Default::default()
        }),
        ports: Some(vec![ContainerPort {
            container_port: spec.container_port,
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: format!("{name}-volume"),
            mount_path: workspace_root.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(name.to_string(), Some(namespace), labels),
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector_labels(name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: format!("{name}-volume"),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: format!("{name}-pvc"),
                            read_only: None,
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn build_service(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    container_port: i32,
    node_port: i32,
) -> Service {
    Service {
        metadata: metadata(format!("{name}-service"), Some(namespace), labels),
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".to_string()),
                port: container_port,
                target_port: Some(IntOrString::Int(container_port)),
                node_port: Some(node_port),
                ..Default::default()
            }]),
            selector: Some(selector_labels(name)),
            ..Default::default()
        }),
        status: None,
    }
}

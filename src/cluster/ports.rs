use std::collections::HashSet;

use k8s_openapi::api::core::v1::Service;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::error::{Error, Result};

/// Allocates a free NodePort from a configured `[min, max)` range.
///
/// The cluster is the source of truth: every allocation lists NodePort
/// services across all namespaces and scans for the first unbound value.
/// There is no local cache to drift when resources are created or destroyed
/// outside this process. The list call is O(services in cluster), which is
/// fine — workload creation is human-triggered and rare.
///
/// Two concurrent allocations can observe the same free port; the later
/// service creation then fails on the duplicate bind and surfaces as a
/// creation failure. That window is accepted instead of a distributed lock.
pub struct PortAllocator {
    client: Client,
    min: i32,
    max: i32,
}

impl PortAllocator {
    pub fn new(client: Client, min: i32, max: i32) -> Self {
        Self { client, min, max }
    }

    pub async fn allocate(&self) -> Result<i32> {
        let services: Api<Service> = Api::all(self.client.clone());
        let list = services.list(&ListParams::default()).await?;

        let used = used_node_ports(&list.items);
        log::info!(
            "ports: {} node ports in use, scanning [{}, {})",
            used.len(),
            self.min,
            self.max
        );

        first_free_port(&used, self.min, self.max).ok_or(Error::PortsExhausted {
            min: self.min,
            max: self.max,
        })
    }
}

/// Collects every bound NodePort across the given services.
fn used_node_ports(services: &[Service]) -> HashSet<i32> {
    let mut used = HashSet::new();

    for service in services {
        let Some(spec) = &service.spec else { continue };
        if spec.type_.as_deref() != Some("NodePort") {
            continue;
        }
        for port in spec.ports.iter().flatten() {
            if let Some(node_port) = port.node_port {
                used.insert(node_port);
            }
        }
    }

    used
}

/// First value in `[min, max)` not present in `used`.
fn first_free_port(used: &HashSet<i32>, min: i32, max: i32) -> Option<i32> {
    (min..max).find(|port| !used.contains(port))
}

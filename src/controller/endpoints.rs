//! Resolves a service to the internal addresses of the nodes running it.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::{debug, warn};

use crate::error::Result;

/// Node address type eligible for origin servers.
const INTERNAL_IP: &str = "InternalIP";

/// Lists the pods selected by `service` and collects one internal address
/// per distinct node hosting them.
///
/// Only a failure of the pod listing itself is an error. A node that cannot
/// be fetched, or that advertises no internal address, is skipped so a single
/// bad node does not hide the remaining backends. An empty set is a valid
/// result meaning the service currently has no scheduled backends.
pub async fn resolve_node_addresses(
    client: &Client,
    service: &Service,
) -> Result<BTreeSet<String>> {
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let selector = selector_string(service.spec.as_ref().and_then(|s| s.selector.as_ref()));

    let pods: Api<Pod> = Api::namespaced(client.clone(), &namespace);
    let nodes: Api<Node> = Api::all(client.clone());

    let pod_list = pods.list(&ListParams::default().labels(&selector)).await?;

    let mut seen_nodes = BTreeSet::new();
    let mut addresses = BTreeSet::new();
    for pod in &pod_list.items {
        let Some(node_name) = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) else {
            debug!("Pod {} is not scheduled yet, skipping", pod.name_any());
            continue;
        };
        if !seen_nodes.insert(node_name.to_string()) {
            continue;
        }
        let node = match nodes.get(node_name).await {
            Ok(node) => node,
            Err(e) => {
                warn!(
                    "Failed to fetch node {} for pod {}: {}",
                    node_name,
                    pod.name_any(),
                    e
                );
                continue;
            }
        };
        match internal_address(&node) {
            Some(ip) => {
                addresses.insert(ip.to_string());
            }
            None => warn!("Node {} advertises no internal address", node_name),
        }
    }

    Ok(addresses)
}

/// Formats a pod selector as a `k=v,...` label selector expression. An empty
/// selector matches every pod in the namespace, mirroring how the cluster
/// itself treats a service without a selector-backed endpoint slice.
pub(crate) fn selector_string(selector: Option<&BTreeMap<String, String>>) -> String {
    selector
        .map(|s| {
            s.iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

/// First address of type `InternalIP`, if the node advertises one.
pub(crate) fn internal_address(node: &Node) -> Option<&str> {
    node.status
        .as_ref()?
        .addresses
        .as_ref()?
        .iter()
        .find(|addr| addr.type_ == INTERNAL_IP)
        .map(|addr| addr.address.as_str())
}

//! Reconciles service lifecycle events against the remote origin-pool store.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use kube::{Client, ResourceExt};
use reqwest::StatusCode;
use tracing::{info, instrument};

use crate::config::Config;
use crate::controller::endpoints::resolve_node_addresses;
use crate::error::{Error, Result};
use crate::naming::canonicalize;
use crate::xc::{build_origin_pool, node_port, OriginPoolClient};

/// Exposure type that qualifies a service for synchronization.
const NODE_PORT_TYPE: &str = "NodePort";

/// Service lifecycle notification, as classified by the watcher.
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    Added(Arc<Service>),
    Updated(Arc<Service>),
    Removed(Arc<Service>),
}

impl ServiceEvent {
    pub fn service(&self) -> &Service {
        match self {
            ServiceEvent::Added(s) | ServiceEvent::Updated(s) | ServiceEvent::Removed(s) => s,
        }
    }
}

/// Whether a service is in scope: only NodePort services publish a port on
/// every cluster node and can therefore back an origin pool of node
/// addresses.
pub fn qualifies(service: &Service) -> bool {
    service.spec.as_ref().and_then(|s| s.type_.as_deref()) == Some(NODE_PORT_TYPE)
}

/// Handles one event end to end: derive the canonical name, decide
/// create/update/delete, call the XC API, log the outcome.
///
/// Holds only shared read-only handles, so it is freely cloneable across
/// worker tasks. No state survives between events; existence of the remote
/// pool is re-queried on every create/update decision.
#[derive(Clone)]
pub struct Reconciler {
    client: Client,
    pools: OriginPoolClient,
    config: Arc<Config>,
}

impl Reconciler {
    pub fn new(client: Client, pools: OriginPoolClient, config: Arc<Config>) -> Self {
        Self {
            client,
            pools,
            config,
        }
    }

    /// Failures are terminal for the single attempt; there is no retry and
    /// nothing is written back to the cluster. The next service event (or
    /// the watcher's own resync) is the recovery path.
    #[instrument(skip(self, event), fields(service = %event.service().name_any()))]
    pub async fn handle(&self, event: ServiceEvent) -> Result<()> {
        match event {
            ServiceEvent::Added(service) | ServiceEvent::Updated(service) => {
                if !qualifies(&service) {
                    // A service edited away from NodePort keeps its last
                    // synced pool; deleting it on that transition is
                    // deliberately not done.
                    return Ok(());
                }
                self.sync(&service).await
            }
            ServiceEvent::Removed(service) => {
                if !qualifies(&service) {
                    return Ok(());
                }
                self.remove(&service).await
            }
        }
    }

    async fn sync(&self, service: &Service) -> Result<()> {
        // Precondition: without an assigned node port there is nothing to
        // point the pool at. Checked before any remote traffic.
        node_port(service)?;

        let name = canonicalize(&service.name_any());
        let exists = self.pools.exists(&name).await?;

        let addresses = resolve_node_addresses(&self.client, service).await?;
        if addresses.is_empty() {
            // Still synced: XC marks an empty pool unhealthy, which is the
            // truthful state while no pods are scheduled.
            info!("Service {} has no backing nodes", service.name_any());
        }
        let pool = build_origin_pool(service, &addresses, &self.config)?;

        if exists {
            info!("Origin pool {} exists, updating", name);
            self.pools.update(&name, &pool).await?;
            info!("Updated origin pool {}", name);
        } else {
            info!("Creating origin pool {}", name);
            self.pools.create(&pool).await?;
            info!("Created origin pool {}", name);
        }
        Ok(())
    }

    /// Delete path: no existence check first; the delete call itself reports
    /// "not found" when the pool is already gone, which is not a failure.
    async fn remove(&self, service: &Service) -> Result<()> {
        let name = canonicalize(&service.name_any());
        match self.pools.delete(&name).await {
            Ok(()) => {
                info!("Deleted origin pool {}", name);
                Ok(())
            }
            Err(Error::ApiError { status, .. }) if status == StatusCode::NOT_FOUND => {
                info!("Origin pool {} was already absent", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

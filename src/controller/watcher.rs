//! Service event subscription and dispatch.
//!
//! Events for the same canonical pool name are funneled to a single worker
//! task, so create/update/delete calls for one remote resource never overlap
//! while distinct services still reconcile concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::controller::reconciler::{qualifies, Reconciler, ServiceEvent};
use crate::error::Result;
use crate::naming::canonicalize;

/// Watches services and feeds qualifying events to the reconciler until the
/// watch stream ends or fails terminally.
pub async fn run_watcher(reconciler: Reconciler, client: Client, config: Arc<Config>) -> Result<()> {
    let services: Api<Service> = match &config.kube_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    match &config.kube_namespace {
        Some(namespace) => info!("Watching services in namespace {}", namespace),
        None => info!("Watching services in all namespaces"),
    }

    let mut dispatcher = Dispatcher::new(reconciler);
    // Keys already delivered at least once, to tell additions from updates.
    let mut known: HashSet<String> = HashSet::new();

    let mut stream = watcher(services, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = stream.try_next().await? {
        match event {
            watcher::Event::Apply(service) | watcher::Event::InitApply(service) => {
                let service = Arc::new(service);
                let event = if known.insert(event_key(&service)) {
                    ServiceEvent::Added(service)
                } else {
                    ServiceEvent::Updated(service)
                };
                dispatcher.dispatch(event);
            }
            watcher::Event::Delete(service) => {
                let service = Arc::new(service);
                known.remove(&event_key(&service));
                dispatcher.dispatch(ServiceEvent::Removed(service));
            }
            watcher::Event::Init | watcher::Event::InitDone => {}
        }
    }

    info!("Service watch stream ended");
    Ok(())
}

fn event_key(service: &Service) -> String {
    format!(
        "{}/{}",
        service.namespace().unwrap_or_default(),
        service.name_any()
    )
}

/// Routes events to one worker task per canonical origin-pool name.
struct Dispatcher {
    reconciler: Reconciler,
    workers: HashMap<String, mpsc::UnboundedSender<ServiceEvent>>,
}

impl Dispatcher {
    fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            workers: HashMap::new(),
        }
    }

    /// Forwards the event to the worker owning its canonical name, spawning
    /// the worker on first use. Each worker owns its name for the process
    /// lifetime, including across a delete and re-add of the same service;
    /// tearing it down on removal would let a later re-add spawn a second
    /// worker racing the draining delete. The map is bounded by the number
    /// of distinct pool names ever seen.
    fn dispatch(&mut self, event: ServiceEvent) {
        let service = event.service();
        if !qualifies(service) {
            debug!("Ignoring non-NodePort service {}", service.name_any());
            return;
        }

        let key = canonicalize(&service.name_any());
        if !self.workers.contains_key(&key) {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_worker(key.clone(), self.reconciler.clone(), rx));
            self.workers.insert(key.clone(), tx);
        }

        if let Some(tx) = self.workers.get(&key) {
            if tx.send(event).is_err() {
                error!("Reconcile worker for {} is gone, dropping event", key);
            }
        }
    }
}

async fn run_worker(
    key: String,
    reconciler: Reconciler,
    mut events: mpsc::UnboundedReceiver<ServiceEvent>,
) {
    while let Some(event) = events.recv().await {
        if let Err(e) = reconciler.handle(event).await {
            error!("Reconciliation of origin pool {} failed: {}", key, e);
        }
    }
    debug!("Reconcile worker for {} stopped", key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SitePlacement;
    use crate::xc::OriginPoolClient;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn nodeport_service(name: &str) -> Arc<Service> {
        Arc::new(Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("NodePort".to_string()),
                selector: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
                ports: Some(vec![ServicePort {
                    port: 80,
                    node_port: Some(30080),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn test_reconciler(kube_server: &MockServer, xc_server: &MockServer) -> Reconciler {
        let kube_config = kube::Config::new(kube_server.uri().parse().unwrap());
        let client = Client::try_from(kube_config).unwrap();
        let config = Arc::new(Config {
            kube_namespace: None,
            xc_namespace: "test".to_string(),
            xc_token: "secret".to_string(),
            site_name: "test-site".to_string(),
            site_placement: SitePlacement::Inside,
            api_domain: xc_server.uri(),
        });
        let pools = OriginPoolClient::new(&config).unwrap();
        Reconciler::new(client, pools, config)
    }

    #[tokio::test]
    async fn delete_and_readd_of_one_pool_reconcile_in_order() {
        let kube_server = MockServer::start().await;
        let xc_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/default/pods"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "apiVersion": "v1",
                "kind": "PodList",
                "metadata": {"resourceVersion": "1"},
                "items": []
            })))
            .mount(&kube_server)
            .await;

        // The delete is slow; the create path for the same pool must not
        // start until it has finished.
        Mock::given(method("DELETE"))
            .and(path("/api/config/namespaces/test/origin_pools/web"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .expect(1)
            .mount(&xc_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/config/namespaces/test/origin_pools/web"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&xc_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/config/namespaces/test/origin_pools"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&xc_server)
            .await;

        let mut dispatcher = Dispatcher::new(test_reconciler(&kube_server, &xc_server));
        dispatcher.dispatch(ServiceEvent::Removed(nodeport_service("web")));
        dispatcher.dispatch(ServiceEvent::Added(nodeport_service("web")));

        // While the delete is still pending, no other call for this pool may
        // have been issued.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let methods: Vec<String> = xc_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.method.to_string())
            .collect();
        assert_eq!(methods, vec!["DELETE".to_string()]);

        // Once the delete drains, the re-add runs and recreates the pool.
        tokio::time::sleep(Duration::from_millis(700)).await;
        let methods: Vec<String> = xc_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.method.to_string())
            .collect();
        assert_eq!(
            methods,
            vec![
                "DELETE".to_string(),
                "GET".to_string(),
                "POST".to_string()
            ]
        );
    }
}

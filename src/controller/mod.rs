//! Service watch and reconciliation: the watcher classifies cluster events,
//! the reconciler drives the remote origin-pool lifecycle, and the endpoint
//! resolver maps a service to the nodes backing it.

pub mod endpoints;
mod reconciler;
mod watcher;

pub use endpoints::resolve_node_addresses;
pub use reconciler::{qualifies, Reconciler, ServiceEvent};
pub use watcher::run_watcher;

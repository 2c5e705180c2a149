//! Static process configuration.
//!
//! Assembled once in `main` from CLI arguments and environment variables and
//! shared read-only with the reconciler and the XC client.

use clap::ValueEnum;

/// Which site interface the cluster's node addresses are reachable on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SitePlacement {
    Inside,
    Outside,
}

/// Immutable configuration for one synchronizer process.
#[derive(Clone, Debug)]
pub struct Config {
    /// Cluster namespace to watch; `None` watches every namespace.
    pub kube_namespace: Option<String>,
    /// XC configuration namespace holding the origin pools.
    pub xc_namespace: String,
    /// XC API token, sent as `Authorization: APIToken <token>`.
    pub xc_token: String,
    /// XC site every origin server is attached to.
    pub site_name: String,
    /// Network side the origin addresses belong to on that site.
    pub site_placement: SitePlacement,
    /// API base URL, e.g. `https://tenant.console.ves.volterra.io`.
    pub api_domain: String,
}

//! Wire types for the XC origin-pool configuration API and the builder that
//! turns a service plus its resolved endpoints into the desired payload.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use serde::{Serialize, Serializer};

use crate::config::{Config, SitePlacement};
use crate::error::{Error, Result};
use crate::naming::canonicalize;

/// Tenant owning the referenced site objects.
pub const SITE_TENANT: &str = "f5-sa-rnxeudss";
/// XC namespace that site objects live in.
pub const SITE_NAMESPACE: &str = "system";
pub const SITE_KIND: &str = "site";

pub const POOL_DESCRIPTION: &str = "Created by OriginSync";
pub const LB_ALGORITHM: &str = "LB_OVERRIDE";
pub const ENDPOINT_SELECTION: &str = "LOCAL_PREFERRED";

/// Serializes a set flag as the empty JSON object the XC schema uses for
/// option markers; unset flags are skipped entirely via `is_false`.
fn empty_object<S: Serializer>(_flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    serializer.serialize_map(Some(0))?.end()
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct OriginPool {
    pub metadata: Metadata,
    pub spec: OriginPoolSpec,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub disable: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct OriginPoolSpec {
    pub origin_servers: Vec<OriginServer>,
    /// Plain TCP towards the origins. Always set in this design; the node
    /// port carries whatever the service carries.
    #[serde(serialize_with = "empty_object", skip_serializing_if = "is_false")]
    pub no_tls: bool,
    /// Listening port, taken from the service's node port.
    pub port: i32,
    /// Marker telling XC to dial every endpoint on `port`.
    #[serde(serialize_with = "empty_object", skip_serializing_if = "is_false")]
    pub same_as_endpoint_port: bool,
    pub loadbalancer_algorithm: String,
    pub endpoint_selection: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct OriginServer {
    pub private_ip: PrivateIp,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PrivateIp {
    pub ip: String,
    pub site_locator: SiteLocator,
    /// Exactly one of these is set, from the static site placement.
    #[serde(serialize_with = "empty_object", skip_serializing_if = "is_false")]
    pub inside_network: bool,
    #[serde(serialize_with = "empty_object", skip_serializing_if = "is_false")]
    pub outside_network: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SiteLocator {
    pub site: SiteRef,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SiteRef {
    pub tenant: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

/// Node port of the service's first declared port.
///
/// A service without one cannot be synced; callers check this before any
/// remote traffic is issued.
pub fn node_port(service: &Service) -> Result<i32> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .and_then(|port| port.node_port)
        .ok_or_else(|| Error::MissingNodePort {
            service: service.name_any(),
        })
}

/// Builds the declarative origin-pool payload for `service` backed by
/// `endpoints`. An empty endpoint set yields a pool with no origin servers,
/// which is a valid payload; XC reports such a pool unhealthy until backends
/// return.
pub fn build_origin_pool(
    service: &Service,
    endpoints: &BTreeSet<String>,
    config: &Config,
) -> Result<OriginPool> {
    let port = node_port(service)?;

    let origin_servers = endpoints
        .iter()
        .map(|ip| OriginServer {
            private_ip: PrivateIp {
                ip: ip.clone(),
                site_locator: SiteLocator {
                    site: SiteRef {
                        tenant: SITE_TENANT.to_string(),
                        namespace: SITE_NAMESPACE.to_string(),
                        name: config.site_name.clone(),
                        kind: SITE_KIND.to_string(),
                    },
                },
                inside_network: config.site_placement == SitePlacement::Inside,
                outside_network: config.site_placement == SitePlacement::Outside,
            },
        })
        .collect();

    Ok(OriginPool {
        metadata: Metadata {
            name: canonicalize(&service.name_any()),
            description: POOL_DESCRIPTION.to_string(),
            disable: false,
        },
        spec: OriginPoolSpec {
            origin_servers,
            no_tls: true,
            port,
            same_as_endpoint_port: true,
            loadbalancer_algorithm: LB_ALGORITHM.to_string(),
            endpoint_selection: ENDPOINT_SELECTION.to_string(),
        },
    })
}

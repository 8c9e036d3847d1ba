//! Meshroute builder: the Istio VirtualService for a Revision.
//!
//! Three pure steps, each feeding the next:
//! - [`make_virtual_service`]: metadata (name, owner, labels, annotations)
//! - [`spec::make_virtual_service_spec`]: gateways, hosts and the route list
//! - [`route::make_http_route`]: destination, retries and activator mirror
//!
//! Callers must pass a Revision with a non-empty name; see
//! [`meshroute_core::Revision::validate`].

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use meshroute_core::{controller_ref, Addressing, Revision, SystemConfig, REVISION_LABEL_KEY};
use meshroute_istio::VirtualService;
use tracing::debug;

pub mod route;
pub mod spec;

pub use route::{make_http_route, PER_TRY_TIMEOUT, RETRY_ATTEMPTS, ROUTE_PORT, ROUTE_WEIGHT};
pub use spec::{make_virtual_service_spec, GATEWAYS, INGRESS_GATEWAY, MESH_GATEWAY, SHARED_GATEWAY};

/// Collaborators consulted while building: hostname resolution and system config.
#[derive(Clone, Copy)]
pub struct RouteContext<'a> {
    pub addressing: &'a dyn Addressing,
    pub config: &'a SystemConfig,
}

impl<'a> RouteContext<'a> {
    pub fn new(addressing: &'a dyn Addressing, config: &'a SystemConfig) -> Self {
        Self { addressing, config }
    }
}

// `dyn Addressing` has no Debug bound; only the config is shown.
impl std::fmt::Debug for RouteContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteContext").field("config", self.config).finish_non_exhaustive()
    }
}

/// Build the VirtualService routing all traffic for `rev`.
///
/// The result owns copies of everything taken from `rev`. A missing
/// revision label is written as an empty string.
pub fn make_virtual_service(rev: &Revision, ctx: &RouteContext<'_>) -> VirtualService {
    let mut labels = BTreeMap::new();
    labels.insert(REVISION_LABEL_KEY.to_string(), rev.revision_label().unwrap_or_default().to_string());

    let metadata = ObjectMeta {
        name: Some(rev.name().to_string()),
        owner_references: Some(vec![controller_ref(rev)]),
        annotations: rev.metadata.annotations.clone(),
        labels: Some(labels),
        ..Default::default()
    };

    debug!(revision = %rev.name(), namespace = %rev.namespace(), "building virtual service");
    VirtualService::new(metadata, make_virtual_service_spec(rev, ctx))
}

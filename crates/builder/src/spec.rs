use meshroute_core::Revision;
use meshroute_istio::VirtualServiceSpec;

use crate::{route::make_http_route, RouteContext};

// Fixed until gateways can be discovered; a pluggable policy may replace these.
pub const INGRESS_GATEWAY: &str = "knative-ingress-gateway.knative-serving.svc.cluster.local";
pub const SHARED_GATEWAY: &str = "knative-shared-gateway.knative-serving.svc.cluster.local";
/// Sidecar traffic inside the mesh.
pub const MESH_GATEWAY: &str = "mesh";

pub const GATEWAYS: [&str; 3] = [INGRESS_GATEWAY, SHARED_GATEWAY, MESH_GATEWAY];

/// Gateways to bind, the single host to match, and the single HTTP route.
pub fn make_virtual_service_spec(rev: &Revision, ctx: &RouteContext<'_>) -> VirtualServiceSpec {
    VirtualServiceSpec {
        gateways: GATEWAYS.iter().map(|g| g.to_string()).collect(),
        hosts: vec![ctx.addressing.service_hostname(rev)],
        http: vec![make_http_route(rev, ctx)],
    }
}

//! The HTTP route: one full-weight destination, a retry budget, and a mirror
//! to the activator.

use meshroute_core::{Revision, SystemConfig};
use meshroute_istio::{Destination, HTTPRetry, HTTPRoute, HTTPRouteDestination, PortSelector};

use crate::RouteContext;

pub const ROUTE_PORT: u32 = 80;
/// Single destination, so it takes all traffic.
pub const ROUTE_WEIGHT: i32 = 100;

// Retries absorb dial failures while a revision is being woken up, not
// application errors. Static for now; a pluggable retry policy may replace them.
pub const RETRY_ATTEMPTS: i32 = 1000;
pub const PER_TRY_TIMEOUT: &str = "100ms";

pub fn make_http_route(rev: &Revision, ctx: &RouteContext<'_>) -> HTTPRoute {
    HTTPRoute {
        route: vec![HTTPRouteDestination {
            destination: Destination {
                host: ctx.addressing.routing_target(rev),
                port: PortSelector::number(ROUTE_PORT),
            },
            weight: ROUTE_WEIGHT,
        }],
        retries: Some(HTTPRetry {
            attempts: RETRY_ATTEMPTS,
            per_try_timeout: PER_TRY_TIMEOUT.to_string(),
            // TODO: set retry_on "gateway-error" once the installed Istio supports it.
            retry_on: None,
        }),
        mirror: Some(activator_mirror(ctx.config)),
    }
}

/// Mirror target: the activator in the system namespace, whatever the primary destination is.
pub fn activator_mirror(config: &SystemConfig) -> Destination {
    Destination { host: config.activator_host(), port: PortSelector::number(ROUTE_PORT) }
}

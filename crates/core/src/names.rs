//! Network names for Revisions.

use tracing::debug;

use crate::config::{cluster_local_host, SystemConfig};
use crate::{Revision, ServingState};

/// Resolves the hostnames routing rules point at.
pub trait Addressing: Send + Sync {
    /// Hostname a Revision is reachable under; what a routing rule matches on.
    fn service_hostname(&self, rev: &Revision) -> String;

    /// Where live traffic for the Revision should be sent right now:
    /// its own internal endpoint, or the activator while it has no capacity.
    fn routing_target(&self, rev: &Revision) -> String;
}

/// Kubernetes service name fronting a Revision.
pub fn service_name(rev: &Revision) -> String {
    format!("{}-service", rev.name())
}

/// Service name of the per-revision endpoint that bypasses the mesh rule.
pub fn internal_service_name(rev: &Revision) -> String {
    format!("{}-service-internal", rev.name())
}

/// Default addressing over cluster-local DNS.
#[derive(Debug, Clone, Default)]
pub struct ClusterAddressing {
    system: SystemConfig,
}

impl ClusterAddressing {
    pub fn new(system: SystemConfig) -> Self {
        Self { system }
    }
}

impl Addressing for ClusterAddressing {
    fn service_hostname(&self, rev: &Revision) -> String {
        cluster_local_host(&service_name(rev), rev.namespace())
    }

    fn routing_target(&self, rev: &Revision) -> String {
        match rev.spec.serving_state {
            Some(ServingState::Reserve) => {
                debug!(revision = %rev.name(), "revision in reserve; routing through activator");
                self.system.activator_host()
            }
            _ => cluster_local_host(&internal_service_name(rev), rev.namespace()),
        }
    }
}

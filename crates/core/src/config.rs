//! Process-wide system configuration.
//!
//! Built once at start-up and handed to builders explicitly.

use serde::{Deserialize, Serialize};

pub const SYSTEM_NAMESPACE_ENV: &str = "SYSTEM_NAMESPACE";
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "knative-serving";

const ACTIVATOR_SERVICE: &str = "activator-service";
const CLUSTER_DOMAIN_SUFFIX: &str = "svc.cluster.local";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemConfig {
    /// Namespace the control plane (activator included) runs in.
    pub namespace: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { namespace: DEFAULT_SYSTEM_NAMESPACE.to_string() }
    }
}

impl SystemConfig {
    /// Uses `namespace` as given; no fallback is applied here.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }

    /// Read `SYSTEM_NAMESPACE`; unset or empty falls back to `knative-serving`.
    pub fn from_env() -> Self {
        match std::env::var(SYSTEM_NAMESPACE_ENV) {
            Ok(ns) if !ns.is_empty() => Self::new(ns),
            _ => Self::default(),
        }
    }

    /// Fully-qualified activator service host in the system namespace.
    pub fn activator_host(&self) -> String {
        format!("{}.{}.{}", ACTIVATOR_SERVICE, self.namespace, CLUSTER_DOMAIN_SUFFIX)
    }
}

/// `<service>.<namespace>.svc.cluster.local`
pub fn cluster_local_host(service: &str, namespace: &str) -> String {
    format!("{}.{}.{}", service, namespace, CLUSTER_DOMAIN_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activator_host_is_scoped_by_namespace() {
        assert_eq!(SystemConfig::default().activator_host(), "activator-service.knative-serving.svc.cluster.local");
        assert_eq!(SystemConfig::new("ops").activator_host(), "activator-service.ops.svc.cluster.local");
    }

    #[test]
    fn new_keeps_namespace_verbatim() {
        assert_eq!(SystemConfig::new("").namespace, "");
        assert_eq!(SystemConfig::new("").activator_host(), "activator-service..svc.cluster.local");
    }

    // Only test touching SYSTEM_NAMESPACE; the steps run in sequence to avoid env races.
    #[test]
    fn from_env_reads_namespace_and_falls_back_when_unset_or_empty() {
        std::env::set_var(SYSTEM_NAMESPACE_ENV, "serving-prod");
        assert_eq!(SystemConfig::from_env().namespace, "serving-prod");

        std::env::set_var(SYSTEM_NAMESPACE_ENV, "");
        assert_eq!(SystemConfig::from_env(), SystemConfig::default());

        std::env::remove_var(SYSTEM_NAMESPACE_ENV);
        assert_eq!(SystemConfig::from_env().namespace, DEFAULT_SYSTEM_NAMESPACE);
    }
}

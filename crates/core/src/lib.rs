//! Meshroute core types: the Revision input model and the collaborators
//! (ownership, addressing, system config) the VirtualService builder consumes.

#![forbid(unsafe_code)]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod names;
pub mod owner;

pub use config::{SystemConfig, DEFAULT_SYSTEM_NAMESPACE, SYSTEM_NAMESPACE_ENV};
pub use names::{Addressing, ClusterAddressing};
pub use owner::{controller_ref, ObjectIdentity, TypeIdentity};

/// Label carrying the revision identity; copied onto every resource built for a Revision.
pub const REVISION_LABEL_KEY: &str = "serving.knative.dev/revision";

pub const REVISION_API_VERSION: &str = "serving.knative.dev/v1alpha1";
pub const REVISION_KIND: &str = "Revision";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("revision is missing metadata.name")]
    MissingName,
    #[error("invalid revision name {0:?}: must be a DNS-1123 label")]
    InvalidName(String),
    #[error("decode: {0}")]
    Decode(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Serving state of a Revision. `Reserve` means scaled to zero: traffic goes through the activator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServingState {
    Active,
    Reserve,
    Retired,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_state: Option<ServingState>,
}

/// Knative Revision, reduced to the fields routing depends on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    #[serde(default = "Revision::api_version")]
    pub api_version: String,
    #[serde(default = "Revision::kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RevisionSpec,
}

static DNS1123_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));

impl Revision {
    fn api_version() -> String {
        REVISION_API_VERSION.to_string()
    }
    fn kind() -> String {
        REVISION_KIND.to_string()
    }

    pub fn new(metadata: ObjectMeta, spec: RevisionSpec) -> Self {
        Self { api_version: Self::api_version(), kind: Self::kind(), metadata, spec }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    /// Namespace, falling back to `default` like the API server does for namespaced kinds.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Value of the revision-identity label, if present.
    pub fn revision_label(&self) -> Option<&str> {
        self.metadata.labels.as_ref()?.get(REVISION_LABEL_KEY).map(String::as_str)
    }

    /// Checks the minimal shape the builders rely on: a non-empty DNS-1123 name.
    pub fn validate(&self) -> CoreResult<()> {
        let name = self.name();
        if name.is_empty() {
            return Err(CoreError::MissingName);
        }
        if name.len() > 63 || !DNS1123_LABEL.is_match(name) {
            return Err(CoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Decode a Revision from an arbitrary JSON value (e.g. a `DynamicObject`).
    pub fn from_json(v: serde_json::Value) -> CoreResult<Self> {
        let rev: Revision = serde_json::from_value(v).map_err(|e| CoreError::Decode(e.to_string()))?;
        if rev.kind != REVISION_KIND {
            return Err(CoreError::Decode(format!("expected kind {}, got {}", REVISION_KIND, rev.kind)));
        }
        Ok(rev)
    }
}

impl TypeIdentity for Revision {
    const API_VERSION: &'static str = REVISION_API_VERSION;
    const KIND: &'static str = REVISION_KIND;
}

impl ObjectIdentity for Revision {
    fn object_meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

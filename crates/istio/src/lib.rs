//! Istio `networking.istio.io/v1alpha3` VirtualService types.
//!
//! Only the subset meshroute emits is modeled. Serialization matches the
//! Istio CRD schema so the value can be server-side applied as-is.

#![forbid(unsafe_code)]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "networking.istio.io";
pub const API_VERSION: &str = "v1alpha3";
pub const KIND: &str = "VirtualService";

/// Istio VirtualService: routing rules applied to traffic for a set of hosts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    #[serde(default = "VirtualService::api_version")]
    pub api_version: String,
    #[serde(default = "VirtualService::kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: VirtualServiceSpec,
}

impl VirtualService {
    fn api_version() -> String {
        format!("{}/{}", API_GROUP, API_VERSION)
    }
    fn kind() -> String {
        KIND.to_string()
    }

    pub fn new(metadata: ObjectMeta, spec: VirtualServiceSpec) -> Self {
        Self { api_version: Self::api_version(), kind: Self::kind(), metadata, spec }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VirtualServiceSpec {
    /// Gateways and sidecars the rule applies to; `mesh` means all sidecars.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
    /// Destination hosts the rule matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Ordered HTTP rules; the first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HTTPRoute>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HTTPRoute {
    /// Weighted destinations; weights sum to 100.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<HTTPRouteDestination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<HTTPRetry>,
    /// Shadow destination receiving a copy of every matched request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<Destination>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HTTPRouteDestination {
    pub destination: Destination,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub weight: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub host: String,
    #[serde(default, skip_serializing_if = "PortSelector::is_empty")]
    pub port: PortSelector,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PortSelector {
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub number: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl PortSelector {
    pub fn number(number: u32) -> Self {
        Self { number, name: String::new() }
    }

    fn is_empty(&self) -> bool {
        self.number == 0 && self.name.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HTTPRetry {
    pub attempts: i32,
    /// Duration string, e.g. `100ms`.
    pub per_try_timeout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on: Option<String>,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

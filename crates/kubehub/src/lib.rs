//! Meshroute kubehub: kube client and typed access to live Revisions.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use kube::{
    api::{Api, ListParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use meshroute_core::{Revision, REVISION_KIND};
use tracing::{debug, info, warn};

const SERVING_GROUP: &str = "serving.knative.dev";
const SERVING_VERSION: &str = "v1alpha1";

/// Client from the ambient kubeconfig or in-cluster service account.
pub async fn get_kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client from default config")
}

/// `ApiResource` for `serving.knative.dev/v1alpha1` Revisions.
pub fn revision_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(SERVING_GROUP, SERVING_VERSION, REVISION_KIND))
}

fn revision_api(client: Client, namespace: &str) -> Api<DynamicObject> {
    Api::namespaced_with(client, namespace, &revision_api_resource())
}

fn to_revision(obj: &DynamicObject) -> Result<Revision> {
    let mut raw = serde_json::to_value(obj).context("serializing DynamicObject")?;
    // List items may come back without type meta.
    if let Some(map) = raw.as_object_mut() {
        map.entry("kind").or_insert_with(|| REVISION_KIND.into());
        map.entry("apiVersion").or_insert_with(|| format!("{}/{}", SERVING_GROUP, SERVING_VERSION).into());
    }
    Revision::from_json(raw).map_err(Into::into)
}

/// Fetch one Revision by name.
pub async fn get_revision(client: Client, namespace: &str, name: &str) -> Result<Revision> {
    let obj = revision_api(client, namespace)
        .get(name)
        .await
        .with_context(|| format!("getting revision {}/{}", namespace, name))?;
    to_revision(&obj)
}

/// List all Revisions in a namespace. Objects that fail to decode are skipped with a warning.
pub async fn list_revisions(client: Client, namespace: &str) -> Result<Vec<Revision>> {
    let list = revision_api(client, namespace)
        .list(&ListParams::default())
        .await
        .with_context(|| format!("listing revisions in {}", namespace))?;
    let mut out = Vec::with_capacity(list.items.len());
    for obj in list.items.iter() {
        match to_revision(obj) {
            Ok(rev) => out.push(rev),
            Err(e) => warn!(name = ?obj.metadata.name, error = %e, "skipping undecodable revision"),
        }
    }
    debug!(namespace, count = out.len(), "listed revisions");
    // Stable order for reconcile output
    out.sort_by(|a, b| a.name().cmp(b.name()));
    info!(namespace, revisions = out.len(), "revisions loaded");
    Ok(out)
}

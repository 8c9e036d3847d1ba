//! Meshroute apply: Revision manifest parsing, VirtualService rendering and
//! server-side apply with dry-run and a minimal diff against the live object.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use kube::{
    api::{Api, Patch, PatchParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use meshroute_core::{Revision, REVISION_KIND};
use meshroute_istio::VirtualService;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, info};

pub const FIELD_MANAGER: &str = "meshroute";

fn max_yaml_bytes() -> usize {
    std::env::var("MESHROUTE_MAX_YAML_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1 << 20) // 1 MiB default
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    Yaml,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSummary { pub adds: usize, pub updates: usize, pub removes: usize }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub name: String,
    pub namespace: String,
    pub dry_run: bool,
    pub applied: bool,
    pub resource_version: Option<String>,
    /// Difference to the live object; a missing live object counts as a single add.
    pub summary: DiffSummary,
}

/// Parse a (possibly multi-document) YAML manifest into Revisions.
///
/// Empty documents are skipped; any document that is not a Revision is an error
/// naming its position.
pub fn parse_revisions(yaml: &str) -> Result<Vec<Revision>> {
    parse_revisions_within(yaml, max_yaml_bytes())
}

fn parse_revisions_within(yaml: &str, max_bytes: usize) -> Result<Vec<Revision>> {
    if yaml.len() > max_bytes {
        return Err(anyhow!("YAML payload too large (>{} bytes)", max_bytes));
    }
    let mut out = Vec::new();
    for (idx, doc) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let val = serde_yaml::Value::deserialize(doc).with_context(|| format!("parsing YAML document {}", idx))?;
        if val.is_null() {
            continue;
        }
        let json = serde_json::to_value(val).with_context(|| format!("converting YAML document {} to JSON", idx))?;
        let kind = json.get("kind").and_then(|v| v.as_str()).ok_or_else(|| anyhow!("document {}: missing kind", idx))?;
        if kind != REVISION_KIND {
            return Err(anyhow!("document {}: expected kind {}, got {}", idx, REVISION_KIND, kind));
        }
        let rev = Revision::from_json(json).with_context(|| format!("document {}", idx))?;
        out.push(rev);
    }
    debug!(count = out.len(), "parsed revisions");
    Ok(out)
}

/// Render a VirtualService for output.
pub fn render(vs: &VirtualService, format: Format) -> Result<String> {
    match format {
        Format::Yaml => serde_yaml::to_string(vs).context("rendering YAML"),
        Format::Json => serde_json::to_string_pretty(vs).context("rendering JSON"),
    }
}

/// Render several VirtualServices as one document stream: `---`-separated YAML,
/// or a single JSON array.
pub fn render_all(items: &[VirtualService], format: Format) -> Result<String> {
    match format {
        Format::Yaml => {
            let docs = items.iter().map(|vs| render(vs, Format::Yaml)).collect::<Result<Vec<_>>>()?;
            Ok(docs.join("---\n"))
        }
        Format::Json => {
            let mut out = serde_json::to_string_pretty(items).context("rendering JSON")?;
            out.push('\n');
            Ok(out)
        }
    }
}

pub fn virtual_service_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        meshroute_istio::API_GROUP,
        meshroute_istio::API_VERSION,
        meshroute_istio::KIND,
    ))
}

/// Server-side apply `vs` into `namespace`, or only validate it when `dry_run`.
pub async fn apply_virtual_service(client: Client, namespace: &str, vs: &VirtualService, dry_run: bool) -> Result<ApplyOutcome> {
    counted(dry_run, async {
        let (name, target) = prepare_target(vs, namespace)?;
        let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &virtual_service_api_resource());

        let live = match api.get_opt(&name).await.with_context(|| format!("getting virtual service {}/{}", namespace, name))? {
            Some(obj) => strip_noisy(serde_json::to_value(&obj)?),
            None => Json::Null,
        };
        let summary = diff_summary(&strip_noisy(target.clone()), &live);

        let mut pp = PatchParams::apply(FIELD_MANAGER).force();
        if dry_run {
            pp = pp.dry_run();
        }
        let obj = api
            .patch(&name, &pp, &Patch::Apply(&target))
            .await
            .map_err(|e| anyhow!("server-side apply of {}/{} failed: {}", namespace, name, e))?;
        info!(name = %name, namespace, dry_run, adds = summary.adds, updates = summary.updates, removes = summary.removes, "virtual service applied");
        Ok::<_, anyhow::Error>(ApplyOutcome {
            name,
            namespace: namespace.to_string(),
            dry_run,
            applied: !dry_run,
            resource_version: if dry_run { None } else { obj.metadata.resource_version },
            summary,
        })
    })
    .await
}

/// Every attempt ends in exactly one of `vs_apply_ok`, `vs_apply_dry_ok` or `vs_apply_err`.
async fn counted<F>(dry_run: bool, apply: F) -> Result<ApplyOutcome>
where
    F: std::future::Future<Output = Result<ApplyOutcome>>,
{
    let t0 = std::time::Instant::now();
    counter!("vs_apply_attempts", 1u64);
    let res = apply.await;
    match &res {
        Ok(_) => {
            histogram!("vs_apply_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
            if dry_run {
                counter!("vs_apply_dry_ok", 1u64);
            } else {
                counter!("vs_apply_ok", 1u64);
            }
        }
        Err(_) => {
            counter!("vs_apply_err", 1u64);
        }
    }
    res
}

/// Name and apply payload (with namespace set) for `vs`.
fn prepare_target(vs: &VirtualService, namespace: &str) -> Result<(String, Json)> {
    let name = vs.metadata.name.clone().ok_or_else(|| anyhow!("virtual service missing metadata.name"))?;
    let mut target = serde_json::to_value(vs).context("serializing VirtualService")?;
    ensure_metadata(&mut target, &name, namespace);
    Ok((name, target))
}

fn strip_noisy(mut v: Json) -> Json {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
            obj.remove("resourceVersion");
            obj.remove("generation");
            obj.remove("creationTimestamp");
            obj.remove("uid");
        }
    }
    // Status is server-populated; ignore it during diffs
    if let Some(obj) = v.as_object_mut() { obj.remove("status"); }
    v
}

fn ensure_metadata(v: &mut Json, name: &str, ns: &str) {
    let Some(root) = v.as_object_mut() else { return };
    let meta = root.entry("metadata").or_insert(Json::Object(serde_json::Map::new()));
    if let Some(obj) = meta.as_object_mut() {
        obj.insert("name".into(), Json::String(name.to_string()));
        obj.insert("namespace".into(), Json::String(ns.to_string()));
    }
}

/// Count keys/elements added, updated and removed going from `base` to `target`.
pub fn diff_summary(target: &Json, base: &Json) -> DiffSummary {
    fn walk(a: &Json, b: &Json, s: &mut DiffSummary) {
        use serde_json::Value as V;
        match (a, b) {
            (V::Object(ao), V::Object(bo)) => {
                for (k, av) in ao.iter() {
                    match bo.get(k) {
                        Some(bv) if av == bv => {}
                        Some(bv) => walk(av, bv, s),
                        None => s.adds += 1,
                    }
                }
                s.removes += bo.keys().filter(|k| !ao.contains_key(*k)).count();
            }
            (V::Array(aa), V::Array(bb)) => {
                s.updates += aa.iter().zip(bb.iter()).filter(|(x, y)| x != y).count();
                if aa.len() > bb.len() { s.adds += aa.len() - bb.len(); }
                if bb.len() > aa.len() { s.removes += bb.len() - aa.len(); }
            }
            (_, V::Null) => s.adds += 1,
            (av, bv) => { if av != bv { s.updates += 1; } }
        }
    }
    let mut s = DiffSummary::default();
    walk(target, base, &mut s);
    s
}

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use meshroute_builder::{make_virtual_service, RouteContext, GATEWAYS};
use meshroute_core::{Addressing, ClusterAddressing, Revision, RevisionSpec, ServingState, SystemConfig, REVISION_LABEL_KEY};

/// Fixed answers, so assertions don't depend on the default naming scheme.
struct StaticAddressing {
    host: &'static str,
    target: &'static str,
}

impl Addressing for StaticAddressing {
    fn service_hostname(&self, _rev: &Revision) -> String { self.host.to_string() }
    fn routing_target(&self, _rev: &Revision) -> String { self.target.to_string() }
}

fn revision(name: &str, label: Option<&str>) -> Revision {
    let labels = label.map(|v| BTreeMap::from([(REVISION_LABEL_KEY.to_string(), v.to_string())]));
    Revision::new(
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some("6f1e9a2c-0000-4000-8000-000000000001".to_string()),
            labels,
            annotations: Some(BTreeMap::from([("a".to_string(), "1".to_string())])),
            ..Default::default()
        },
        RevisionSpec::default(),
    )
}

#[test]
fn concrete_scenario_foo_v1() {
    let addressing = StaticAddressing {
        host: "foo-v1.default.svc.cluster.local",
        target: "foo-v1-service-internal.default.svc.cluster.local",
    };
    let config = SystemConfig::new("knative-serving");
    let vs = make_virtual_service(&revision("foo-v1", Some("foo-v1")), &RouteContext::new(&addressing, &config));

    assert_eq!(vs.metadata.name.as_deref(), Some("foo-v1"));
    assert_eq!(vs.spec.hosts, vec!["foo-v1.default.svc.cluster.local".to_string()]);
    assert_eq!(vs.spec.gateways, GATEWAYS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    assert_eq!(vs.spec.http.len(), 1);

    let route = &vs.spec.http[0];
    assert_eq!(route.route.len(), 1);
    assert_eq!(route.route[0].destination.host, "foo-v1-service-internal.default.svc.cluster.local");
    assert_eq!(route.route[0].destination.port.number, 80);
    assert_eq!(route.route[0].weight, 100);
    let retries = route.retries.as_ref().unwrap();
    assert_eq!(retries.attempts, 1000);
    assert_eq!(retries.per_try_timeout, "100ms");
    let mirror = route.mirror.as_ref().unwrap();
    assert_eq!(mirror.host, "activator-service.knative-serving.svc.cluster.local");
    assert_eq!(mirror.port.number, 80);
}

#[test]
fn owner_reference_points_at_revision_as_controller() {
    let config = SystemConfig::default();
    let addressing = ClusterAddressing::new(config.clone());
    let vs = make_virtual_service(&revision("foo-v1", Some("foo-v1")), &RouteContext::new(&addressing, &config));

    let owners = vs.metadata.owner_references.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].api_version, "serving.knative.dev/v1alpha1");
    assert_eq!(owners[0].kind, "Revision");
    assert_eq!(owners[0].name, "foo-v1");
    assert_eq!(owners[0].uid, "6f1e9a2c-0000-4000-8000-000000000001");
    assert_eq!(owners[0].controller, Some(true));
    assert_eq!(owners[0].block_owner_deletion, Some(true));
}

#[test]
fn revision_label_copied_or_empty() {
    let config = SystemConfig::default();
    let addressing = ClusterAddressing::new(config.clone());
    let ctx = RouteContext::new(&addressing, &config);

    let with = make_virtual_service(&revision("foo-v1", Some("foo-v1")), &ctx);
    assert_eq!(with.metadata.labels.unwrap().get(REVISION_LABEL_KEY).map(String::as_str), Some("foo-v1"));

    let without = make_virtual_service(&revision("foo-v1", None), &ctx);
    assert_eq!(without.metadata.labels.unwrap().get(REVISION_LABEL_KEY).map(String::as_str), Some(""));
}

#[test]
fn gateways_and_policy_constants_ignore_revision_content() {
    let config = SystemConfig::default();
    let addressing = ClusterAddressing::new(config.clone());
    let ctx = RouteContext::new(&addressing, &config);

    let mut reserve = revision("bar-00002", None);
    reserve.spec.serving_state = Some(ServingState::Reserve);
    reserve.metadata.namespace = Some("other".to_string());

    for rev in [revision("foo-v1", Some("foo-v1")), reserve] {
        let vs = make_virtual_service(&rev, &ctx);
        assert_eq!(vs.spec.gateways.len(), 3);
        assert_eq!(vs.spec.gateways[2], "mesh");
        assert_eq!(vs.spec.hosts, vec![addressing.service_hostname(&rev)]);
        let route = &vs.spec.http[0];
        assert_eq!(route.route.iter().map(|d| d.weight).sum::<i32>(), 100);
        assert_eq!(route.retries.as_ref().unwrap().attempts, 1000);
        assert_eq!(route.mirror.as_ref().unwrap().host, "activator-service.knative-serving.svc.cluster.local");
    }
}

#[test]
fn reserve_revision_routes_primary_traffic_to_activator_and_still_mirrors() {
    let config = SystemConfig::new("serving-system");
    let addressing = ClusterAddressing::new(config.clone());
    let mut rev = revision("foo-v1", Some("foo-v1"));
    rev.spec.serving_state = Some(ServingState::Reserve);

    let vs = make_virtual_service(&rev, &RouteContext::new(&addressing, &config));
    let route = &vs.spec.http[0];
    assert_eq!(route.route[0].destination.host, "activator-service.serving-system.svc.cluster.local");
    assert_eq!(route.mirror.as_ref().unwrap().host, "activator-service.serving-system.svc.cluster.local");
}

#[test]
fn mirror_host_tracks_configured_namespace() {
    let addressing = ClusterAddressing::default();
    for ns in ["knative-serving", "a", "serving-prod"] {
        let config = SystemConfig::new(ns);
        let vs = make_virtual_service(&revision("foo-v1", None), &RouteContext::new(&addressing, &config));
        assert_eq!(
            vs.spec.http[0].mirror.as_ref().unwrap().host,
            format!("activator-service.{}.svc.cluster.local", ns)
        );
    }
}

#[test]
fn building_twice_yields_equal_outputs() {
    let config = SystemConfig::default();
    let addressing = ClusterAddressing::new(config.clone());
    let ctx = RouteContext::new(&addressing, &config);
    let rev = revision("foo-v1", Some("foo-v1"));
    assert_eq!(make_virtual_service(&rev, &ctx), make_virtual_service(&rev, &ctx));
}

#[test]
fn annotations_are_not_shared_with_revision() {
    let config = SystemConfig::default();
    let addressing = ClusterAddressing::new(config.clone());
    let ctx = RouteContext::new(&addressing, &config);
    let mut rev = revision("foo-v1", Some("foo-v1"));

    let mut vs = make_virtual_service(&rev, &ctx);
    assert_eq!(vs.metadata.annotations, rev.metadata.annotations);

    vs.metadata.annotations.get_or_insert_with(BTreeMap::new).insert("added".into(), "x".into());
    assert!(!rev.metadata.annotations.as_ref().unwrap().contains_key("added"));

    rev.metadata.annotations.get_or_insert_with(BTreeMap::new).insert("later".into(), "y".into());
    assert!(!vs.metadata.annotations.as_ref().unwrap().contains_key("later"));
}

#[test]
fn renders_expected_wire_shape() {
    let addressing = StaticAddressing { host: "h.default.svc.cluster.local", target: "t.default.svc.cluster.local" };
    let config = SystemConfig::new("knative-serving");
    let vs = make_virtual_service(&revision("foo-v1", Some("foo-v1")), &RouteContext::new(&addressing, &config));
    let v = serde_json::to_value(&vs).unwrap();
    assert_eq!(
        v["spec"]["http"][0],
        serde_json::json!({
            "route": [{ "destination": { "host": "t.default.svc.cluster.local", "port": { "number": 80 } }, "weight": 100 }],
            "retries": { "attempts": 1000, "perTryTimeout": "100ms" },
            "mirror": { "host": "activator-service.knative-serving.svc.cluster.local", "port": { "number": 80 } }
        })
    );
    assert_eq!(v["metadata"]["ownerReferences"][0]["controller"], serde_json::json!(true));
}

#[test]
fn route_context_debug_shows_config() {
    let config = SystemConfig::new("ks");
    let addressing = ClusterAddressing::new(config.clone());
    let out = format!("{:?}", RouteContext::new(&addressing, &config));
    assert!(out.starts_with("RouteContext"));
    assert!(out.contains("namespace: \"ks\""));
    assert!(out.ends_with(".. }"));
}

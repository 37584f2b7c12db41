//! Integration tests for the provisioning pipeline surface
//!
//! Everything here exercises the engine-free parts: identifier
//! derivation, allocation, route generation, spec assembly and the
//! bootstrap plan. Engine-backed behavior is covered by the per-module
//! unit tests against constructed listing entries.

use spawnpress::allocator::{next_port, table_prefix, used_ports, LABEL_HOST_PORT};
use spawnpress::bootstrap::{plan, BootstrapParams, BootstrapStep};
use spawnpress::config::Config;
use spawnpress::naming;
use spawnpress::provisioner::{assemble_site_spec, CreateSiteRequest};
use spawnpress::routes::route_labels;
use spawnpress::site::{Site, LABEL_MULTI_TENANT, LABEL_SITE_NAME, LABEL_TABLE_PREFIX};

use bollard::models::ContainerSummary;
use std::collections::HashMap;

fn site_summary(name: &str, port: u16) -> ContainerSummary {
    let mut labels = HashMap::new();
    labels.insert(LABEL_SITE_NAME.to_string(), name.to_string());
    labels.insert(LABEL_TABLE_PREFIX.to_string(), format!("abcdef_{port}"));
    labels.insert(LABEL_HOST_PORT.to_string(), port.to_string());
    labels.insert(LABEL_MULTI_TENANT.to_string(), "false".to_string());
    let names = naming::derive("spawnpress-site-", name).unwrap();
    ContainerSummary {
        id: Some(format!("id-{name}")),
        names: Some(vec![format!("/{}", names.container)]),
        image: Some("wordpress:6.4.0".to_string()),
        labels: Some(labels),
        created: Some(1_700_000_000),
        ..Default::default()
    }
}

#[test]
fn create_demo_site_derives_expected_identifiers() {
    let config = Config::default();
    let names = naming::derive(&config.sites.container_prefix, "demo").unwrap();

    // container name is prefix + base64url(sanitize("demo")), unpadded
    assert_eq!(names.container, "spawnpress-site-ZGVtbw");

    // first site gets the base port
    let port = next_port(&[], config.sites.base_port);
    assert_eq!(port, 10000);

    // table prefix is six lowercase letters, an underscore, the port
    let prefix = table_prefix(port);
    let (nonce, suffix) = prefix.split_once('_').unwrap();
    assert_eq!(nonce.len(), 6);
    assert!(nonce.chars().all(|c| c.is_ascii_lowercase()));
    assert_eq!(suffix, "10000");
}

#[test]
fn demo_site_urls() {
    let summary = site_summary("demo", 10000);
    let site = Site::from_container("spawnpress-site-", &summary).unwrap();
    assert_eq!(site.url("localhost"), "https://demo.localhost");
    assert!(site.admin_url("localhost").ends_with("/wp-login.php"));
    assert_eq!(site.management_url(), "http://localhost:10000");
}

#[test]
fn allocation_over_existing_fleet_skips_gaps() {
    let containers = vec![
        site_summary("alpha", 10000),
        site_summary("beta", 10001),
        site_summary("gamma", 10003),
    ];
    let port = next_port(&used_ports(&containers), 10000);
    assert_eq!(port, 10004);
}

#[test]
fn sequential_allocation_yields_strictly_increasing_unique_ports() {
    // Serialized scan-then-decide: each allocation sees the previous
    // container in the listing, so ports never collide.
    let mut containers: Vec<ContainerSummary> = Vec::new();
    let mut allocated = Vec::new();
    for i in 0..8 {
        let port = next_port(&used_ports(&containers), 10000);
        allocated.push(port);
        containers.push(site_summary(&format!("site{i}"), port));
    }
    let mut deduped = allocated.clone();
    deduped.dedup();
    assert_eq!(deduped, allocated);
    assert!(allocated.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(allocated[0], 10000);
    assert_eq!(allocated[7], 10007);
}

#[test]
fn names_differing_only_in_disallowed_characters_collapse() {
    let a = naming::derive("wp-", "My Site!").unwrap();
    let b = naming::derive("wp-", "MySite").unwrap();
    assert_eq!(a.container, b.container);
}

#[test]
fn route_labels_regenerate_identically() {
    let config = Config::default();
    let a = route_labels(&config.domains, "demo", 80);
    let b = route_labels(&config.domains, "demo", 80);
    assert_eq!(a, b);
}

#[test]
fn multisite_conversion_runs_exactly_once_after_install() {
    let params = BootstrapParams {
        db_host: "spawnpress-db".into(),
        db_name: "spawnpress-site-ZGVtbw".into(),
        db_user: "root".into(),
        db_password: "password".into(),
        table_prefix: "abcdef_10000".into(),
        site_url: "https://demo.localhost".into(),
        site_title: "Your Site Title".into(),
        admin_user: "admin".into(),
        admin_password: "password".into(),
        admin_email: "admin@example.org".into(),
        host_port: 10000,
        multi_tenant: true,
    };
    let steps: Vec<BootstrapStep> = plan(&params).iter().map(|(step, _)| *step).collect();

    let install = steps
        .iter()
        .position(|s| *s == BootstrapStep::Installing)
        .unwrap();
    let convert = steps
        .iter()
        .position(|s| *s == BootstrapStep::Converting)
        .unwrap();
    assert!(convert > install);
    assert_eq!(
        steps
            .iter()
            .filter(|s| **s == BootstrapStep::Converting)
            .count(),
        1
    );

    // Single-tenant sites never convert
    let single = BootstrapParams {
        multi_tenant: false,
        ..params
    };
    assert!(plan(&single)
        .iter()
        .all(|(step, _)| *step != BootstrapStep::Converting));
}

#[test]
fn assembled_spec_round_trips_through_listing() {
    // A spec assembled for a create must rehydrate into the same site
    // from the listing the engine would return for it.
    let config = Config::default();
    let request = CreateSiteRequest {
        name: "demo".into(),
        version: "6.4.0".into(),
        multi_tenant: true,
        extra_volumes: Vec::new(),
    };
    let names = naming::derive(&config.sites.container_prefix, &request.name).unwrap();
    let spec = assemble_site_spec(&config, &names, "wordpress:6.4.0", 10000, "abcdef_10000", &request);

    let summary = ContainerSummary {
        id: Some("deadbeef".to_string()),
        names: Some(vec![format!("/{}", spec.name)]),
        image: Some(spec.image.clone()),
        labels: Some(spec.labels.clone()),
        created: Some(1_700_000_000),
        ..Default::default()
    };
    let site = Site::from_container(&config.sites.container_prefix, &summary).unwrap();
    assert_eq!(site.name, "demo");
    assert_eq!(site.version, "6.4.0");
    assert_eq!(site.host_port, 10000);
    assert_eq!(site.table_prefix, "abcdef_10000");
    assert!(site.multi_tenant);
}

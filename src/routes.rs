//! Traefik label generation for per-site routing
//!
//! Routing is configured entirely through labels attached to the site
//! container at creation time; the proxy watches the engine and rebuilds
//! its routing table on every container add/remove. Label maps are built
//! as ordered maps so identical input always produces byte-identical
//! output.

use crate::config::DomainConfig;
use std::collections::BTreeMap;

/// Labels routing `<site_name>.<base_domain>` to a container port.
///
/// Produces the HTTPS router with TLS termination and security headers,
/// the plain-HTTP router that redirects to HTTPS, and the load-balancer
/// target. The load-balancer port is the in-container port; routing
/// happens container-to-container, never through the host mapping.
pub fn route_labels(
    domains: &DomainConfig,
    site_name: &str,
    container_port: u16,
) -> BTreeMap<String, String> {
    let domain = format!("{}.{}", site_name, domains.base_domain);
    let router = format!("{site_name}-router");
    let middleware = format!("{site_name}-headers");

    let mut labels = BTreeMap::new();
    let mut set = |key: String, value: &str| {
        labels.insert(key, value.to_string());
    };

    set("traefik.enable".into(), "true");

    // HTTPS router
    set(
        format!("traefik.http.routers.{router}.rule"),
        &format!("Host(`{domain}`)"),
    );
    set(
        format!("traefik.http.routers.{router}.entrypoints"),
        &domains.entrypoint_websecure,
    );
    set(format!("traefik.http.routers.{router}.tls"), "true");
    set(
        format!("traefik.http.routers.{router}.tls.certresolver"),
        &domains.cert_resolver,
    );
    set(
        format!("traefik.http.routers.{router}.middlewares"),
        &middleware,
    );
    set(
        format!("traefik.http.services.{router}.loadbalancer.server.port"),
        &container_port.to_string(),
    );

    // HTTP router, redirected to HTTPS
    set(
        format!("traefik.http.routers.{router}-http.rule"),
        &format!("Host(`{domain}`)"),
    );
    set(
        format!("traefik.http.routers.{router}-http.entrypoints"),
        &domains.entrypoint_web,
    );
    set(
        format!("traefik.http.routers.{router}-http.middlewares"),
        "redirect-to-https",
    );
    set(
        format!("traefik.http.routers.{router}-http.service"),
        "noop@internal",
    );
    set(
        "traefik.http.middlewares.redirect-to-https.redirectscheme.scheme".into(),
        "https",
    );

    // Security headers on the HTTPS router
    set(
        format!("traefik.http.middlewares.{middleware}.headers.SSLRedirect"),
        "true",
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.SSLHost"),
        &domain,
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.STSSeconds"),
        "31536000",
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.STSIncludeSubdomains"),
        "true",
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.STSPreload"),
        "true",
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.frameDeny"),
        "true",
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.contentTypeNosniff"),
        "true",
    );
    set(
        format!("traefik.http.middlewares.{middleware}.headers.browserXSSFilter"),
        "true",
    );

    labels
}

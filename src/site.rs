//! Site model: one tenant's WordPress instance
//!
//! A site is a container plus a database schema plus a routing entry.
//! URLs are never stored; they are computed from the name and host port
//! at read time.

use crate::allocator::LABEL_HOST_PORT;
use crate::docker::summary_name;
use crate::naming;
use bollard::models::ContainerSummary;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Label recording the human-readable site name
pub const LABEL_SITE_NAME: &str = "spawnpress.site-name";
/// Label recording the site's table prefix
pub const LABEL_TABLE_PREFIX: &str = "spawnpress.table-prefix";
/// Label recording whether the site was converted to multisite
pub const LABEL_MULTI_TENANT: &str = "spawnpress.multi-tenant";

/// A provisioned site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Engine-assigned container id
    pub id: String,
    /// Sanitized display name
    pub name: String,
    /// WordPress image tag the site runs
    pub version: String,
    /// Whether the instance was converted to multisite at creation
    pub multi_tenant: bool,
    /// Per-site namespace inside the shared database
    pub table_prefix: String,
    /// Externally reachable host port, unique across sites
    pub host_port: u16,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Public URL behind the reverse proxy
    pub fn url(&self, base_domain: &str) -> String {
        format!("https://{}.{}", self.name, base_domain)
    }

    /// WordPress login URL
    pub fn admin_url(&self, base_domain: &str) -> String {
        format!("{}/wp-login.php", self.url(base_domain))
    }

    /// Direct host-port URL, bypassing the proxy
    pub fn management_url(&self) -> String {
        format!("http://localhost:{}", self.host_port)
    }

    /// Rehydrate a site from an engine listing entry. Returns None for
    /// containers that do not carry site identity (foreign containers
    /// caught by the name filter).
    pub fn from_container(prefix: &str, summary: &ContainerSummary) -> Option<Self> {
        let container_name = summary_name(summary)?;
        let labels = summary.labels.as_ref();
        let name = labels
            .and_then(|l| l.get(LABEL_SITE_NAME).cloned())
            .or_else(|| naming::display_name_of(prefix, container_name))?;
        let version = summary
            .image
            .as_deref()
            .and_then(|image| image.rsplit_once(':'))
            .map(|(_, tag)| tag.to_string())
            .unwrap_or_else(|| "latest".to_string());
        let table_prefix = labels
            .and_then(|l| l.get(LABEL_TABLE_PREFIX).cloned())
            .unwrap_or_default();
        let host_port = labels
            .and_then(|l| l.get(LABEL_HOST_PORT))
            .and_then(|value| value.parse().ok())?;
        let multi_tenant = labels
            .and_then(|l| l.get(LABEL_MULTI_TENANT))
            .map(|value| value == "true")
            .unwrap_or(false);
        let created_at = summary
            .created
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        Some(Self {
            id: summary.id.clone().unwrap_or_default(),
            name,
            version,
            multi_tenant,
            table_prefix,
            host_port,
            created_at,
        })
    }
}

/// A caller-supplied bind mount layered on top of the mandatory ones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub host_path: String,
    pub container_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn demo_summary() -> ContainerSummary {
        let mut labels = HashMap::new();
        labels.insert(LABEL_SITE_NAME.to_string(), "demo".to_string());
        labels.insert(LABEL_TABLE_PREFIX.to_string(), "abcdef_10000".to_string());
        labels.insert(LABEL_HOST_PORT.to_string(), "10000".to_string());
        labels.insert(LABEL_MULTI_TENANT.to_string(), "false".to_string());
        ContainerSummary {
            id: Some("deadbeef".to_string()),
            names: Some(vec!["/spawnpress-site-ZGVtbw".to_string()]),
            image: Some("wordpress:6.4.0".to_string()),
            labels: Some(labels),
            created: Some(1_700_000_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_urls_derive_from_name_and_port() {
        let site = Site::from_container("spawnpress-site-", &demo_summary()).unwrap();
        assert_eq!(site.url("localhost"), "https://demo.localhost");
        assert_eq!(
            site.admin_url("localhost"),
            "https://demo.localhost/wp-login.php"
        );
        assert_eq!(site.management_url(), "http://localhost:10000");
    }

    #[test]
    fn test_from_container_reads_identity() {
        let site = Site::from_container("spawnpress-site-", &demo_summary()).unwrap();
        assert_eq!(site.id, "deadbeef");
        assert_eq!(site.name, "demo");
        assert_eq!(site.version, "6.4.0");
        assert_eq!(site.table_prefix, "abcdef_10000");
        assert_eq!(site.host_port, 10000);
        assert!(!site.multi_tenant);
    }

    #[test]
    fn test_from_container_falls_back_to_encoded_name() {
        let mut summary = demo_summary();
        let labels = summary.labels.as_mut().unwrap();
        labels.remove(LABEL_SITE_NAME);
        let site = Site::from_container("spawnpress-site-", &summary).unwrap();
        assert_eq!(site.name, "demo");
    }

    #[test]
    fn test_from_container_without_port_is_rejected() {
        let mut summary = demo_summary();
        summary.labels.as_mut().unwrap().remove(LABEL_HOST_PORT);
        assert!(Site::from_container("spawnpress-site-", &summary).is_none());
    }
}

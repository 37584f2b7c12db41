//! Host port and table-prefix allocation
//!
//! There is no persistent allocation ledger. Used ports are re-derived on
//! every call from the engine's own listing of site containers (stopped
//! ones included, so a dormant site keeps its claim), which keeps the
//! allocator correct across process restarts. Callers serialize the
//! scan-then-decide sequence behind the provisioner's allocation mutex.

use crate::docker::summary_name;
use bollard::models::ContainerSummary;
use rand::Rng;

/// Label recording the host port a site container was allocated
pub const LABEL_HOST_PORT: &str = "spawnpress.host-port";

/// Next free host port: one past the highest port in use, or the base
/// port when no site containers exist. Gaps are not reused.
pub fn next_port(used: &[u16], base_port: u16) -> u16 {
    used.iter().max().map_or(base_port, |max| max + 1)
}

/// Host ports claimed by the given site containers.
///
/// The port is read from the identity label; containers from the earlier
/// naming scheme carried it as a trailing numeric name segment instead,
/// so that is the fallback.
pub fn used_ports(containers: &[ContainerSummary]) -> Vec<u16> {
    containers.iter().filter_map(port_of).collect()
}

fn port_of(summary: &ContainerSummary) -> Option<u16> {
    if let Some(port) = summary
        .labels
        .as_ref()
        .and_then(|labels| labels.get(LABEL_HOST_PORT))
        .and_then(|value| value.parse().ok())
    {
        return Some(port);
    }
    summary_name(summary)?
        .rsplit(|c| c == '_' || c == '-')
        .next()
        .and_then(|suffix| suffix.parse().ok())
}

/// Table prefix for a new site: six random lowercase letters, an
/// underscore, then the host port. The port suffix is what guarantees
/// uniqueness; the random part only adds unpredictability.
pub fn table_prefix(host_port: u16) -> String {
    let mut rng = rand::thread_rng();
    let nonce: String = (0..6)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect();
    format!("{nonce}_{host_port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_label(port: &str) -> ContainerSummary {
        let mut labels = HashMap::new();
        labels.insert(LABEL_HOST_PORT.to_string(), port.to_string());
        ContainerSummary {
            names: Some(vec!["/spawnpress-site-ZGVtbw".to_string()]),
            labels: Some(labels),
            ..Default::default()
        }
    }

    fn with_name_suffix(name: &str) -> ContainerSummary {
        ContainerSummary {
            names: Some(vec![format!("/{name}")]),
            ..Default::default()
        }
    }

    #[test]
    fn test_next_port_empty_returns_base() {
        assert_eq!(next_port(&[], 10000), 10000);
    }

    #[test]
    fn test_next_port_is_max_plus_one_gaps_not_reused() {
        assert_eq!(next_port(&[10000, 10001, 10003], 10000), 10004);
        assert_eq!(next_port(&[10003], 10000), 10004);
    }

    #[test]
    fn test_used_ports_from_labels() {
        let containers = vec![with_label("10000"), with_label("10002")];
        let mut ports = used_ports(&containers);
        ports.sort_unstable();
        assert_eq!(ports, vec![10000, 10002]);
    }

    #[test]
    fn test_used_ports_from_legacy_name_suffix() {
        let containers = vec![
            with_name_suffix("wp_container_10005"),
            with_name_suffix("wp-container-10007"),
        ];
        let mut ports = used_ports(&containers);
        ports.sort_unstable();
        assert_eq!(ports, vec![10005, 10007]);
    }

    #[test]
    fn test_unparseable_containers_are_skipped() {
        let containers = vec![with_name_suffix("spawnpress-site-ZGVtbw")];
        assert!(used_ports(&containers).is_empty());
    }

    #[test]
    fn test_table_prefix_shape() {
        let prefix = table_prefix(10000);
        let (nonce, port) = prefix.split_once('_').unwrap();
        assert_eq!(nonce.len(), 6);
        assert!(nonce.chars().all(|c| c.is_ascii_lowercase()));
        assert_eq!(port, "10000");
    }

    #[test]
    fn test_table_prefix_port_suffix_guarantees_uniqueness() {
        // Same port collides only in the random part, which is fine;
        // distinct ports can never collide at all.
        let a = table_prefix(10000);
        let b = table_prefix(10001);
        assert_ne!(a, b);
        assert!(a.ends_with("_10000"));
        assert!(b.ends_with("_10001"));
    }
}

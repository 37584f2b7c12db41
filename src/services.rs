//! Managed singleton services: database, reverse proxy, admin UI
//!
//! Each service is a long-lived container with a fixed, well-known name.
//! `ensure_running` guarantees at most one healthy instance per name:
//! a running, matching container is left alone; a stopped matching one
//! is started; a diverged one (image bump) is force-removed and
//! recreated. Failures here are fatal to process initialization.

use crate::config::Config;
use crate::docker::{ContainerSpec, DockerManager, PublishedPort};
use crate::error::Result;
use crate::routes::route_labels;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Drives the ensure-running state machine for managed services
pub struct ServiceSupervisor {
    docker: Arc<DockerManager>,
    /// Serializes the check-then-act sequence so concurrent callers
    /// cannot both observe "absent" and create twice
    lock: Mutex<()>,
}

impl ServiceSupervisor {
    pub fn new(docker: Arc<DockerManager>) -> Self {
        Self {
            docker,
            lock: Mutex::new(()),
        }
    }

    /// Guarantee exactly one instance of the service described by `spec`
    /// is running. Idempotent: a second call on a healthy service
    /// performs no engine mutation.
    pub async fn ensure_running(&self, spec: &ContainerSpec) -> Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(info) = self.docker.inspect(&spec.name).await? {
            let running = info
                .state
                .as_ref()
                .and_then(|state| state.running)
                .unwrap_or(false);
            let image_matches = info.config.as_ref().and_then(|c| c.image.as_deref())
                == Some(spec.image.as_str());

            if image_matches {
                if running {
                    debug!(service = %spec.name, "Service already running");
                    return Ok(());
                }
                info!(service = %spec.name, "Service exists but is stopped; starting it");
                return self.docker.start_container(&spec.name).await;
            }

            info!(
                service = %spec.name,
                desired_image = %spec.image,
                "Service diverges from desired spec; replacing"
            );
            self.docker.remove(&spec.name).await?;
        }

        self.docker.pull_image(&spec.image).await?;
        self.docker.create_and_start(spec).await?;
        Ok(())
    }

    /// Bring up the shared network and all core services. Called once at
    /// process startup, before any site operation is attempted.
    pub async fn ensure_core_services(&self, config: &Config) -> Result<()> {
        self.docker.ensure_network(&config.network.name).await?;
        self.ensure_running(&proxy_service(config)).await?;
        self.ensure_running(&database_service(config)).await?;
        self.ensure_running(&admin_ui_service(config)).await?;
        info!("Core services are up");
        Ok(())
    }
}

/// Shared MySQL service all site schemas live in
pub fn database_service(config: &Config) -> ContainerSpec {
    let db = &config.database;
    ContainerSpec {
        name: db.container_name.clone(),
        image: db.image.clone(),
        env: vec![format!("MYSQL_ROOT_PASSWORD={}", db.root_password)],
        binds: vec![format!("{}:/var/lib/mysql", db.data_volume)],
        network: Some(config.network.name.clone()),
        ports: vec![PublishedPort {
            container_port: 3306,
            host_port: db.port,
            loopback: false,
        }],
        restart_always: true,
        ..Default::default()
    }
}

/// Traefik reverse proxy; watches the engine through the mounted socket
/// and rebuilds routes from container labels
pub fn proxy_service(config: &Config) -> ContainerSpec {
    let proxy = &config.proxy;
    ContainerSpec {
        name: proxy.container_name.clone(),
        image: proxy.image.clone(),
        binds: vec![
            "/var/run/docker.sock:/var/run/docker.sock:ro".to_string(),
            format!("{}:/etc/traefik/traefik.yml:ro", proxy.static_config),
            format!("{}:/etc/traefik/dynamic.yml:ro", proxy.dynamic_config),
        ],
        network: Some(config.network.name.clone()),
        ports: vec![
            PublishedPort {
                container_port: 80,
                host_port: 80,
                loopback: false,
            },
            PublishedPort {
                container_port: 443,
                host_port: 443,
                loopback: false,
            },
        ],
        restart_always: true,
        ..Default::default()
    }
}

/// phpMyAdmin, routed through the proxy at `db.<base_domain>`
pub fn admin_ui_service(config: &Config) -> ContainerSpec {
    let ui = &config.admin_ui;
    let db = &config.database;
    let labels = route_labels(&config.domains, &ui.subdomain, ui.container_port)
        .into_iter()
        .collect();
    ContainerSpec {
        name: ui.container_name.clone(),
        image: ui.image.clone(),
        env: vec![
            format!("PMA_HOST={}", db.container_name),
            "PMA_PORT=3306".to_string(),
            "PMA_USER=root".to_string(),
            format!("PMA_PASSWORD={}", db.root_password),
        ],
        labels,
        network: Some(config.network.name.clone()),
        restart_always: true,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_service_spec() {
        let config = Config::default();
        let spec = database_service(&config);
        assert_eq!(spec.name, "spawnpress-db");
        assert!(spec.restart_always);
        assert!(spec.env.iter().any(|e| e.starts_with("MYSQL_ROOT_PASSWORD=")));
        assert_eq!(spec.binds, vec!["spawnpress-db-data:/var/lib/mysql"]);
        assert_eq!(spec.ports[0].host_port, 3306);
    }

    #[test]
    fn test_proxy_service_mounts_engine_socket() {
        let config = Config::default();
        let spec = proxy_service(&config);
        assert!(spec
            .binds
            .contains(&"/var/run/docker.sock:/var/run/docker.sock:ro".to_string()));
        let host_ports: Vec<u16> = spec.ports.iter().map(|p| p.host_port).collect();
        assert_eq!(host_ports, vec![80, 443]);
    }

    #[test]
    fn test_admin_ui_routed_at_db_subdomain() {
        let config = Config::default();
        let spec = admin_ui_service(&config);
        assert_eq!(
            spec.labels.get("traefik.http.routers.db-router.rule"),
            Some(&"Host(`db.localhost`)".to_string())
        );
        assert!(spec.ports.is_empty());
    }
}

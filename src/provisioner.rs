//! Site provisioning and teardown
//!
//! Composes naming, allocation, routing and the bootstrap pipeline into
//! the create/delete/list operations. The scan-then-decide part of a
//! create (existence check, port allocation, container launch) runs
//! under a single allocation mutex so concurrent creates always observe
//! disjoint ports.

use crate::allocator::{self, LABEL_HOST_PORT};
use crate::bootstrap::{self, BootstrapParams};
use crate::config::Config;
use crate::database::SchemaAdmin;
use crate::docker::{
    summary_is_running, summary_name, ContainerSpec, DockerManager, PublishedPort, RemoveOutcome,
};
use crate::error::{Error, Result};
use crate::naming::{self, SiteNames};
use crate::readiness;
use crate::routes::route_labels;
use crate::site::{
    Site, VolumeBinding, LABEL_MULTI_TENANT, LABEL_SITE_NAME, LABEL_TABLE_PREFIX,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Bounded engine-level wait before the bootstrap pipeline may exec
const START_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
const START_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Grace period for bulk stops
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of a provisioning request
#[derive(Debug, Clone)]
pub struct CreateSiteRequest {
    /// Raw, user-supplied site name; sanitized before use
    pub name: String,
    /// WordPress image tag
    pub version: String,
    /// Convert the instance to multisite after install (one-way)
    pub multi_tenant: bool,
    /// Extra bind mounts, appended after the mandatory ones
    pub extra_volumes: Vec<VolumeBinding>,
}

/// Outcome of a delete: removing what is already gone is success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

pub struct SiteProvisioner {
    docker: Arc<DockerManager>,
    config: Config,
    schema: SchemaAdmin,
    alloc_lock: Mutex<()>,
}

impl SiteProvisioner {
    pub fn new(docker: Arc<DockerManager>, config: Config) -> Self {
        let schema = SchemaAdmin::new(docker.clone(), &config.database);
        Self {
            docker,
            config,
            schema,
            alloc_lock: Mutex::new(()),
        }
    }

    /// Provision a new site: allocate identifiers, create its schema,
    /// launch the container and run the bootstrap pipeline. The schema
    /// is intentionally left in place when the launch fails, so a retry
    /// with the same name can reuse it.
    pub async fn create_site(&self, request: &CreateSiteRequest) -> Result<Site> {
        let names = naming::derive(&self.config.sites.container_prefix, &request.name)?;
        let image = format!("wordpress:{}", request.version);

        let (container_id, host_port, table_prefix) = {
            let _guard = self.alloc_lock.lock().await;

            if self.docker.exists(&names.container).await? {
                return Err(Error::AlreadyExists(names.display.clone()));
            }

            self.schema.create_schema(&names.container).await?;

            let existing = self
                .docker
                .list_by_prefix(&self.config.sites.container_prefix)
                .await?;
            let host_port = allocator::next_port(
                &allocator::used_ports(&existing),
                self.config.sites.base_port,
            );
            let table_prefix = allocator::table_prefix(host_port);

            info!(
                site = %names.display,
                container = %names.container,
                host_port,
                table_prefix = %table_prefix,
                "Provisioning site"
            );

            let spec = assemble_site_spec(
                &self.config,
                &names,
                &image,
                host_port,
                &table_prefix,
                request,
            );
            let container_id = self.docker.create_and_start(&spec).await?;
            (container_id, host_port, table_prefix)
        };

        // The first bootstrap steps are part of making the container
        // responsive, so only the engine-level state gates them.
        if !self
            .docker
            .wait_running(&names.container, START_WAIT_TIMEOUT, START_POLL_INTERVAL)
            .await
        {
            return Err(Error::Timeout {
                target: format!("container '{}'", names.container),
                timeout: START_WAIT_TIMEOUT,
            });
        }

        let site = Site {
            id: container_id,
            name: names.display.clone(),
            version: request.version.clone(),
            multi_tenant: request.multi_tenant,
            table_prefix: table_prefix.clone(),
            host_port,
            created_at: Utc::now(),
        };

        let params = BootstrapParams {
            db_host: self.config.database.container_name.clone(),
            db_name: names.container.clone(),
            db_user: "root".to_string(),
            db_password: self.config.database.root_password.clone(),
            table_prefix,
            site_url: site.url(&self.config.domains.base_domain),
            site_title: self.config.sites.site_title.clone(),
            admin_user: self.config.sites.admin_user.clone(),
            admin_password: self.config.sites.admin_password.clone(),
            admin_email: self.config.sites.admin_email.clone(),
            host_port,
            multi_tenant: request.multi_tenant,
        };
        bootstrap::run(&self.docker, &names.container, &bootstrap::plan(&params)).await?;

        info!(
            site = %site.name,
            url = %site.url(&self.config.domains.base_domain),
            "Site provisioned"
        );
        Ok(site)
    }

    /// Tear a site down: drop its schema, then force-remove the
    /// container. Deleting a site that is already gone succeeds.
    pub async fn delete_site(&self, name: &str) -> Result<DeleteOutcome> {
        let names = naming::derive(&self.config.sites.container_prefix, name)?;

        self.schema.drop_schema(&names.container).await?;

        match self.docker.remove(&names.container).await? {
            RemoveOutcome::Removed => {
                info!(site = %names.display, "Site deleted");
                Ok(DeleteOutcome::Deleted)
            }
            RemoveOutcome::AlreadyAbsent => {
                info!(site = %names.display, "Site already absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
        }
    }

    /// All known sites, dormant ones included
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let prefix = &self.config.sites.container_prefix;
        let containers = self.docker.list_by_prefix(prefix).await?;
        Ok(containers
            .iter()
            .filter_map(|summary| Site::from_container(prefix, summary))
            .collect())
    }

    /// Probe a site's public URL until it answers or the deadline
    /// passes. Timing out is a normal outcome, not an error.
    pub async fn wait_until_ready(
        &self,
        name: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<bool> {
        let names = naming::derive(&self.config.sites.container_prefix, name)?;
        let url = format!(
            "https://{}.{}",
            names.display, self.config.domains.base_domain
        );
        Ok(readiness::wait_for_site(&url, timeout, interval).await)
    }

    /// Stop every site container. Returns the names of the sites that
    /// were asked to stop.
    pub async fn stop_all(&self) -> Result<Vec<String>> {
        let mut stopped = Vec::new();
        for summary in self.site_container_names(true).await? {
            self.docker.stop_container(&summary, STOP_TIMEOUT).await?;
            stopped.push(summary);
        }
        Ok(stopped)
    }

    /// Start every stopped site container (after a host restart, the
    /// site fleet comes back without re-provisioning)
    pub async fn start_all(&self) -> Result<Vec<String>> {
        let mut started = Vec::new();
        for summary in self.site_container_names(false).await? {
            if let Err(e) = self.docker.start_container(&summary).await {
                warn!(container = %summary, error = %e, "Failed to start site container");
                continue;
            }
            started.push(summary);
        }
        Ok(started)
    }

    /// Names of site containers currently in (or out of) the running state
    async fn site_container_names(&self, running: bool) -> Result<Vec<String>> {
        let containers = self
            .docker
            .list_by_prefix(&self.config.sites.container_prefix)
            .await?;
        Ok(containers
            .iter()
            .filter(|summary| summary_is_running(summary) == running)
            .filter_map(|summary| summary_name(summary).map(str::to_string))
            .collect())
    }
}

/// Assemble the full container specification for a site. Pure: no
/// engine access, so the layering rules are testable directly.
pub fn assemble_site_spec(
    config: &Config,
    names: &SiteNames,
    image: &str,
    host_port: u16,
    table_prefix: &str,
    request: &CreateSiteRequest,
) -> ContainerSpec {
    let deps = &config.sites.deps_dir;
    let mut binds = vec![
        format!("{deps}/wp:/usr/local/bin/wp:ro"),
        format!("{deps}/mysql:/usr/bin/mysql:ro"),
        format!("{deps}/libedit.deb:/tmp/libedit.deb:ro"),
        format!("{deps}/mu-plugins/load.php:/var/www/html/wp-content/mu-plugins/load.php:ro"),
        format!(
            "{deps}/mu-plugins/auto-login.php:/var/www/html/wp-content/mu-plugins/auto-login.php:ro"
        ),
        format!(
            "{content}/{name}:/var/www/html/wp-content/uploads",
            content = config.sites.content_dir,
            name = names.display,
        ),
    ];

    // Caller bindings are appended after the mandatory ones and can
    // never override a mandatory container path.
    let mandatory_targets: Vec<String> = binds
        .iter()
        .filter_map(|bind| bind.split(':').nth(1).map(String::from))
        .collect();
    for extra in &request.extra_volumes {
        if mandatory_targets.contains(&extra.container_path) {
            warn!(
                container_path = %extra.container_path,
                "Ignoring extra volume shadowing a mandatory binding"
            );
            continue;
        }
        binds.push(format!("{}:{}:ro", extra.host_path, extra.container_path));
    }

    let mut labels: std::collections::HashMap<String, String> =
        route_labels(&config.domains, &names.display, config.sites.container_port)
            .into_iter()
            .collect();
    labels.insert(LABEL_SITE_NAME.to_string(), names.display.clone());
    labels.insert(LABEL_TABLE_PREFIX.to_string(), table_prefix.to_string());
    labels.insert(LABEL_HOST_PORT.to_string(), host_port.to_string());
    labels.insert(
        LABEL_MULTI_TENANT.to_string(),
        request.multi_tenant.to_string(),
    );

    ContainerSpec {
        name: names.container.clone(),
        image: image.to_string(),
        env: vec![
            format!("WORDPRESS_DB_HOST={}", config.database.container_name),
            "WORDPRESS_DB_USER=root".to_string(),
            format!("WORDPRESS_DB_PASSWORD={}", config.database.root_password),
            format!("WORDPRESS_DB_NAME={}", names.container),
            format!("WORDPRESS_TABLE_PREFIX={table_prefix}"),
        ],
        binds,
        labels,
        network: Some(config.network.name.clone()),
        ports: vec![PublishedPort {
            container_port: config.sites.container_port,
            host_port,
            loopback: true,
        }],
        restart_always: false,
    }
}

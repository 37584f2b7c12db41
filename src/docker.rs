//! Container engine access for site and service containers
//!
//! Thin capability layer over the Docker API carrying exactly the
//! operations the orchestrator needs: create/start/remove, prefix
//! listing (stopped containers included), network setup, image pulls,
//! bounded running-state waits and in-container command execution.

use crate::error::{is_engine_not_found, Error, Result};
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, HostConfig, PortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A host port published from a container
#[derive(Debug, Clone)]
pub struct PublishedPort {
    pub container_port: u16,
    pub host_port: u16,
    /// Bind to loopback only instead of all interfaces
    pub loopback: bool,
}

/// Complete specification of a container to create
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    /// Bind mounts in `host:container[:mode]` form; named volumes allowed
    pub binds: Vec<String>,
    pub labels: HashMap<String, String>,
    pub network: Option<String>,
    pub ports: Vec<PublishedPort>,
    pub restart_always: bool,
}

/// Captured result of a command executed inside a container
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr interleaved for diagnostics
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Manages engine-level operations for all managed containers
pub struct DockerManager {
    client: Docker,
}

impl DockerManager {
    /// Connect to the Docker daemon and verify it responds
    ///
    /// Connection priority:
    /// 1. Explicit docker_host parameter
    /// 2. DOCKER_HOST environment variable
    /// 3. Platform socket defaults
    pub async fn new(docker_host: Option<&str>) -> anyhow::Result<Self> {
        let client = if let Some(host) = docker_host {
            Self::connect_to_host(host)?
        } else if let Ok(host) = std::env::var("DOCKER_HOST") {
            Self::connect_to_host(&host)?
        } else {
            Docker::connect_with_socket_defaults().map_err(|e| {
                anyhow::anyhow!(
                    "Cannot connect to Docker daemon: {}. \
                     Start dockerd or set DOCKER_HOST.",
                    e
                )
            })?
        };

        client.ping().await.map_err(|e| {
            anyhow::anyhow!(
                "Docker daemon is not responding: {}. \
                 Ensure Docker is running and the socket is accessible.",
                e
            )
        })?;

        debug!("Connected to Docker daemon");
        Ok(Self { client })
    }

    fn connect_to_host(host: &str) -> anyhow::Result<Docker> {
        if host.starts_with("unix://") {
            let socket_path = host.trim_start_matches("unix://");
            Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| anyhow::anyhow!("Cannot connect to Unix socket '{}': {}", socket_path, e))
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| anyhow::anyhow!("Cannot connect to TCP endpoint '{}': {}", host, e))
        } else {
            anyhow::bail!(
                "Invalid docker_host format: '{}'. Expected 'unix:///path/to/socket' or 'tcp://host:port'",
                host
            )
        }
    }

    /// Create the shared bridge network if it does not exist yet
    pub async fn ensure_network(&self, name: &str) -> Result<()> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(_) => {
                debug!(network = name, "Network already exists");
                Ok(())
            }
            Err(e) if is_engine_not_found(&e) => {
                info!(network = name, "Creating network");
                self.client
                    .create_network(CreateNetworkOptions {
                        name: name.to_string(),
                        driver: "bridge".to_string(),
                        ..Default::default()
                    })
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pull an image, surfacing registry errors from the progress stream
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        info!(image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress?;
            if let Some(status) = progress.status {
                debug!(image, status, "Pull progress");
            }
            if let Some(error) = progress.error {
                return Err(Error::Pull {
                    image: image.to_string(),
                    detail: error,
                });
            }
        }

        info!(image, "Image pulled");
        Ok(())
    }

    /// Whether an image is available locally
    pub async fn image_present(&self, image: &str) -> bool {
        self.client.inspect_image(image).await.is_ok()
    }

    /// Create and start a container from a full specification, returning
    /// the engine-assigned id
    pub async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String> {
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for port in &spec.ports {
            let key = format!("{}/tcp", port.container_port);
            port_bindings.insert(
                key.clone(),
                Some(vec![PortBinding {
                    host_ip: port.loopback.then(|| "127.0.0.1".to_string()),
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
            exposed_ports.insert(key, HashMap::new());
        }

        let restart_policy = spec.restart_always.then(|| RestartPolicy {
            name: Some(RestartPolicyNameEnum::ALWAYS),
            ..Default::default()
        });

        let host_config = HostConfig {
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            network_mode: spec.network.clone(),
            restart_policy,
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 409, ..
                } => Error::AlreadyExists(spec.name.clone()),
                other => Error::Engine(other),
            })?;

        self.client
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await?;

        info!(
            name = %spec.name,
            container_id = %response.id,
            image = %spec.image,
            "Created and started container"
        );

        Ok(response.id)
    }

    /// Start an existing (stopped) container by name or id
    pub async fn start_container(&self, name: &str) -> Result<()> {
        self.client
            .start_container(name, None::<StartContainerOptions<String>>)
            .await?;
        info!(name, "Started container");
        Ok(())
    }

    /// Inspect a container; Ok(None) when it does not exist
    pub async fn inspect(&self, name: &str) -> Result<Option<ContainerInspectResponse>> {
        match self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => Ok(Some(info)),
            Err(e) if is_engine_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a container exists, in any state
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.inspect(name).await?.is_some())
    }

    /// Whether a container is currently running
    pub async fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self
            .inspect(name)
            .await?
            .and_then(|info| info.state)
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    /// List containers whose name starts with `prefix`, stopped ones
    /// included. The listing doubles as the allocation ledger, so dormant
    /// sites keep their port and prefix claims visible.
    pub async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![format!("^/{}", prefix)]);
        let options = ListContainersOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };
        Ok(self.client.list_containers(Some(options)).await?)
    }

    /// Stop a container. Already-stopped and absent containers are fine.
    pub async fn stop_container(&self, name: &str, timeout: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.as_secs() as i64,
        };
        match self.client.stop_container(name, Some(options)).await {
            Ok(_) => {
                info!(name, "Stopped container");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!(name, "Container was already stopped");
                Ok(())
            }
            Err(e) if is_engine_not_found(&e) => {
                debug!(name, "Container not found");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Force-remove a container. Removing an absent container succeeds.
    pub async fn remove(&self, name: &str) -> Result<RemoveOutcome> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.client.remove_container(name, Some(options)).await {
            Ok(_) => {
                debug!(name, "Removed container");
                Ok(RemoveOutcome::Removed)
            }
            Err(e) if is_engine_not_found(&e) => {
                debug!(name, "Container already absent");
                Ok(RemoveOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the container reports running. Timeout is an expected
    /// outcome and yields `false`, not an error.
    pub async fn wait_running(&self, name: &str, timeout: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.inspect(name).await {
                Ok(Some(info)) => {
                    if info
                        .state
                        .as_ref()
                        .and_then(|s| s.running)
                        .unwrap_or(false)
                    {
                        return true;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(name, error = %e, "Inspect failed while waiting");
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Execute a command inside a running container and capture its
    /// output and exit status
    pub async fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput> {
        let exec = self
            .client
            .create_exec(
                container,
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } =
            self.client.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::Console { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdIn { .. }) => {}
                    Err(e) => {
                        warn!(container, error = %e, "Error reading exec output");
                        break;
                    }
                }
            }
        }

        let inspect = self.client.inspect_exec(&exec.id).await?;
        Ok(ExecOutput {
            exit_code: inspect.exit_code,
            stdout,
            stderr,
        })
    }
}

/// Result of a force-remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The container did not exist; treated as success on delete paths
    AlreadyAbsent,
}

/// First name of a listing entry, engine's leading slash stripped
pub fn summary_name(summary: &ContainerSummary) -> Option<&str> {
    summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/'))
}

/// Whether a listing entry reports the running state
pub fn summary_is_running(summary: &ContainerSummary) -> bool {
    summary.state.as_deref() == Some("running")
}

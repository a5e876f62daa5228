use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, Stats, StatsOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, HostConfig, PortBinding, PortTypeEnum,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::future::join_all;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::container::state_name;
use super::runtime::{
    ContainerDetails, ContainerEntry, ContainerRuntime, ContainerSpec, HostBinding,
    PublishedPort, RuntimeError, RuntimeResult, StorageDriverInfo, UsageSample,
};

const STOP_TIMEOUT_SECS: i64 = 10;
const SOCKET_TIMEOUT_SECS: u64 = 120;

/// Runtime adapter backed by the Docker Engine API.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    pub async fn connect(socket_path: Option<&str>) -> Result<Self> {
        let docker = match socket_path {
            Some(socket) => Docker::connect_with_socket(socket, SOCKET_TIMEOUT_SECS, &API_DEFAULT_VERSION)?,
            None => Docker::connect_with_socket_defaults()?,
        };

        let version = docker
            .version()
            .await
            .context("Failed to connect to Docker daemon")?;

        info!("Connected to Docker daemon version: {}", version.version.unwrap_or_default());

        Ok(Self { docker })
    }

    async fn sample(&self, entry: &ContainerEntry) -> RuntimeResult<UsageSample> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let stream = self.docker.stats(&entry.name, Some(options));
        futures::pin_mut!(stream);

        match stream.next().await {
            Some(Ok(stats)) => Ok(usage_from_stats(entry, &stats)),
            Some(Err(e)) => Err(classify(e)),
            None => Err(RuntimeError::Call(format!("no stats available for {}", entry.name))),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn list_containers(&self, all: bool) -> RuntimeResult<Vec<ContainerEntry>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(classify)?;

        Ok(containers.into_iter().map(entry_from_summary).collect())
    }

    async fn inspect(&self, name: &str) -> RuntimeResult<ContainerDetails> {
        let response = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(classify)?;

        Ok(details_from_inspect(response))
    }

    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<String> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await
            .map_err(classify)?;

        for warning in &response.warnings {
            warn!(container = %spec.name, "Docker warning: {}", warning);
        }

        // Bind errors only surface at start; don't leave a dead container holding the name.
        if let Err(e) = self
            .docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
        {
            let err = classify(e);
            let cleanup = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(rm) = self.docker.remove_container(&spec.name, Some(cleanup)).await {
                warn!(container = %spec.name, "Failed to clean up unstarted container: {}", rm);
            }
            return Err(err);
        }

        info!("Created container {} with ID: {}", spec.name, response.id);
        Ok(response.id)
    }

    async fn start(&self, name: &str) -> RuntimeResult<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(classify)?;

        info!("Started container: {}", name);
        Ok(())
    }

    async fn stop(&self, name: &str) -> RuntimeResult<()> {
        let options = StopContainerOptions {
            t: STOP_TIMEOUT_SECS,
        };

        self.docker
            .stop_container(name, Some(options))
            .await
            .map_err(classify)?;

        info!("Stopped container: {}", name);
        Ok(())
    }

    async fn remove(&self, name: &str, force: bool) -> RuntimeResult<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(classify)?;

        info!("Removed container: {}", name);
        Ok(())
    }

    async fn storage_driver(&self) -> RuntimeResult<StorageDriverInfo> {
        let info = self.docker.info().await.map_err(classify)?;

        let driver_status = info
            .driver_status
            .unwrap_or_default()
            .into_iter()
            .filter_map(|pair| {
                let mut it = pair.into_iter();
                Some((it.next()?, it.next().unwrap_or_default()))
            })
            .collect();

        Ok(StorageDriverInfo {
            driver: info.driver.unwrap_or_default(),
            driver_status,
        })
    }

    async fn usage(&self) -> RuntimeResult<Vec<UsageSample>> {
        let running = self.list_containers(false).await?;

        let samples = join_all(running.iter().map(|entry| self.sample(entry))).await;

        Ok(running
            .iter()
            .zip(samples)
            .filter_map(|(entry, sample)| match sample {
                Ok(sample) => Some(sample),
                Err(e) => {
                    // Containers routinely exit between the listing and the stats call.
                    debug!(container = %entry.name, "Skipping usage sample: {}", e);
                    None
                }
            })
            .collect())
    }
}

/// Maps an engine error onto the small set of failures the orchestrator acts on.
pub(crate) fn classify(err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError { status_code, message } => {
            let lowered = message.to_lowercase();
            if lowered.contains("port is already allocated")
                || lowered.contains("address already in use")
            {
                RuntimeError::PortInUse(message)
            } else if status_code == 404 {
                RuntimeError::NotFound(message)
            } else if status_code == 409 {
                RuntimeError::Conflict(message)
            } else {
                RuntimeError::Call(message)
            }
        }
        other => RuntimeError::Call(other.to_string()),
    }
}

fn trim_name(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

fn entry_from_summary(summary: ContainerSummary) -> ContainerEntry {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| trim_name(n))
        .unwrap_or_default();

    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| PublishedPort {
            private_port: p.private_port,
            public_port: p.public_port,
            protocol: match p.typ {
                Some(PortTypeEnum::UDP) => "udp".to_string(),
                Some(PortTypeEnum::SCTP) => "sctp".to_string(),
                _ => "tcp".to_string(),
            },
            ip: p.ip,
        })
        .collect();

    ContainerEntry {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
        ports,
    }
}

fn details_from_inspect(response: ContainerInspectResponse) -> ContainerDetails {
    let config = response.config.unwrap_or_default();
    let mut host_config = response.host_config.unwrap_or_default();
    let state = response.state.unwrap_or_default();

    // An exited container reports no network ports; its requested bindings
    // survive in the host config.
    let mut ports = host_bindings(response.network_settings.and_then(|ns| ns.ports));
    if ports.values().all(Vec::is_empty) {
        ports = host_bindings(host_config.port_bindings.take());
    }

    ContainerDetails {
        id: response.id.unwrap_or_default(),
        name: response.name.as_deref().map(trim_name).unwrap_or_default(),
        hostname: config.hostname.unwrap_or_default(),
        image: config.image.unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
        memory: host_config.memory.unwrap_or(0),
        nano_cpus: host_config.nano_cpus.unwrap_or(0),
        storage_opt: host_config.storage_opt.unwrap_or_default(),
        ports,
        running: state.running.unwrap_or(false),
        state: state.status.map(state_name).unwrap_or_default().to_string(),
    }
}

fn host_bindings(
    map: Option<HashMap<String, Option<Vec<PortBinding>>>>,
) -> HashMap<String, Vec<HostBinding>> {
    map.unwrap_or_default()
        .into_iter()
        .map(|(key, bindings)| {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| HostBinding {
                    host_ip: b.host_ip.unwrap_or_default(),
                    host_port: b.host_port.unwrap_or_default(),
                })
                .collect();
            (key, bindings)
        })
        .collect()
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let mut exposed_ports = HashMap::new();
    let mut port_bindings = HashMap::new();

    for (host_port, container_port) in &spec.port_bindings {
        let key = format!("{}/tcp", container_port);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(host_port.to_string()),
            }]),
        );
    }

    let storage_opt = spec
        .storage_size
        .as_ref()
        .map(|size| HashMap::from([("size".to_string(), size.clone())]));

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        memory: Some(spec.memory),
        nano_cpus: Some(spec.nano_cpus),
        storage_opt,
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        hostname: Some(spec.hostname.clone()),
        labels: Some(spec.labels.clone()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

fn usage_from_stats(entry: &ContainerEntry, stats: &Stats) -> UsageSample {
    let cpu_delta = stats
        .cpu_stats
        .cpu_usage
        .total_usage
        .saturating_sub(stats.precpu_stats.cpu_usage.total_usage) as f64;
    let system_delta = stats
        .cpu_stats
        .system_cpu_usage
        .unwrap_or(0)
        .saturating_sub(stats.precpu_stats.system_cpu_usage.unwrap_or(0)) as f64;
    let online_cpus = stats
        .cpu_stats
        .online_cpus
        .or_else(|| {
            stats
                .cpu_stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|v| v.len() as u64)
        })
        .filter(|n| *n > 0)
        .unwrap_or(1) as f64;

    let cpu_percent = if cpu_delta > 0.0 && system_delta > 0.0 {
        cpu_delta / system_delta * online_cpus * 100.0
    } else {
        0.0
    };

    UsageSample {
        name: if stats.name.is_empty() {
            entry.name.clone()
        } else {
            trim_name(&stats.name)
        },
        image: entry.image.clone(),
        cpu_percent,
        memory_usage: stats.memory_stats.usage.unwrap_or(0),
        memory_limit: stats.memory_stats.limit.unwrap_or(0),
    }
}

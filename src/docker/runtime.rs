use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Failure reported by the container runtime, classified just enough for the
/// orchestrator to tell "gone", "port taken" and "everything else" apart.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no such container: {0}")]
    NotFound(String),

    #[error("host port already in use: {0}")]
    PortInUse(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Call(String),
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// One port published by a container, as reported by a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPort {
    pub private_port: u16,
    pub public_port: Option<u16>,
    pub protocol: String,
    pub ip: Option<String>,
}

/// Summary row from a container listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Machine state, e.g. `running` or `exited`.
    pub state: String,
    /// Human status, e.g. `Up 3 minutes`.
    pub status: String,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PublishedPort>,
}

impl ContainerEntry {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Host side of a port mapping from an inspect record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Full configuration of one container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    /// Memory limit in bytes, 0 when unset.
    pub memory: i64,
    pub nano_cpus: i64,
    pub storage_opt: HashMap<String, String>,
    /// Keyed by `<port>/<protocol>`, e.g. `22/tcp`.
    pub ports: HashMap<String, Vec<HostBinding>>,
    pub running: bool,
    pub state: String,
}

/// Everything needed to instantiate and start a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    /// `(host_port, container_port)` pairs, TCP.
    pub port_bindings: Vec<(u16, u16)>,
    pub memory: i64,
    pub nano_cpus: i64,
    pub storage_size: Option<String>,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageDriverInfo {
    pub driver: String,
    pub driver_status: Vec<(String, String)>,
}

/// Point-in-time resource usage of one running container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub name: String,
    pub image: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
}

/// The operations this system needs from a container runtime.
///
/// Implementations hold no state of their own: every call goes to the live
/// runtime, which is the only source of truth.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_containers(&self, all: bool) -> RuntimeResult<Vec<ContainerEntry>>;

    async fn inspect(&self, name: &str) -> RuntimeResult<ContainerDetails>;

    /// Creates and starts a container, returning its id. A container that was
    /// created but failed to start is removed again before returning the error.
    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<String>;

    async fn start(&self, name: &str) -> RuntimeResult<()>;

    async fn stop(&self, name: &str) -> RuntimeResult<()>;

    async fn remove(&self, name: &str, force: bool) -> RuntimeResult<()>;

    async fn storage_driver(&self) -> RuntimeResult<StorageDriverInfo>;

    /// One sample per running container, managed or not.
    async fn usage(&self) -> RuntimeResult<Vec<UsageSample>>;

    /// Host ports currently published by any running container.
    async fn bound_host_ports(&self) -> RuntimeResult<BTreeSet<u16>> {
        let containers = self.list_containers(false).await?;
        Ok(containers
            .iter()
            .filter(|c| c.is_running())
            .flat_map(|c| c.ports.iter().filter_map(|p| p.public_port))
            .collect())
    }
}

mod client;
mod container;
mod runtime;

pub use client::DockerClient;
pub use container::InstanceStatus;
pub use runtime::{
    ContainerDetails, ContainerEntry, ContainerRuntime, ContainerSpec, HostBinding,
    PublishedPort, RuntimeError, RuntimeResult, StorageDriverInfo, UsageSample,
};

/// Container-side SSH endpoint.
pub const SSH_CONTAINER_PORT: u16 = 22;
/// Container-side web endpoint.
pub const WEB_CONTAINER_PORT: u16 = 80;

pub const SSH_PORT_KEY: &str = "22/tcp";
pub const WEB_PORT_KEY: &str = "80/tcp";

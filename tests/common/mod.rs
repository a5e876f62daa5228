#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use vpsman::docker::{
    ContainerDetails, ContainerEntry, ContainerRuntime, ContainerSpec, HostBinding,
    PublishedPort, RuntimeError, RuntimeResult, StorageDriverInfo, UsageSample,
};
use vpsman::operator::{InstanceManager, IMAGE_LABEL};
use vpsman::shared::VpsConfig;

pub const MIB: i64 = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub hostname: String,
    pub labels: HashMap<String, String>,
    pub memory: i64,
    pub nano_cpus: i64,
    pub storage_opt: HashMap<String, String>,
    /// `(host_port, container_port)`
    pub ports: Vec<(u16, u16)>,
    pub running: bool,
}

impl FakeContainer {
    pub fn new(name: &str, image: &str, ports: &[(u16, u16)]) -> Self {
        Self {
            id: format!("id-{}", name),
            name: name.to_string(),
            image: image.to_string(),
            hostname: name.to_string(),
            labels: HashMap::new(),
            memory: 512 * MIB,
            nano_cpus: 500_000_000,
            storage_opt: HashMap::new(),
            ports: ports.to_vec(),
            running: true,
        }
    }

    /// A container as this system would have created it.
    pub fn managed(name: &str, ssh: u16, web: u16) -> Self {
        Self::new(name, "vps-image", &[(ssh, 22), (web, 80)]).label(IMAGE_LABEL, "vps-image")
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn stopped(mut self) -> Self {
        self.running = false;
        self
    }

    fn state(&self) -> &'static str {
        if self.running {
            "running"
        } else {
            "exited"
        }
    }

    fn entry(&self) -> ContainerEntry {
        ContainerEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
            state: self.state().to_string(),
            status: if self.running { "Up 2 minutes" } else { "Exited (0) 1 minute ago" }.to_string(),
            labels: self.labels.clone(),
            ports: if self.running {
                self.ports
                    .iter()
                    .map(|(host, container)| PublishedPort {
                        private_port: *container,
                        public_port: Some(*host),
                        protocol: "tcp".to_string(),
                        ip: Some("0.0.0.0".to_string()),
                    })
                    .collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Mirrors `DockerClient`, which reports the requested bindings of an
    /// exited container from its host config.
    fn details(&self) -> ContainerDetails {
        ContainerDetails {
            id: self.id.clone(),
            name: self.name.clone(),
            hostname: self.hostname.clone(),
            image: self.image.clone(),
            labels: self.labels.clone(),
            memory: self.memory,
            nano_cpus: self.nano_cpus,
            storage_opt: self.storage_opt.clone(),
            ports: self
                .ports
                .iter()
                .map(|(host, container)| {
                    (
                        format!("{}/tcp", container),
                        vec![HostBinding {
                            host_ip: if self.running { "0.0.0.0" } else { "" }.to_string(),
                            host_port: host.to_string(),
                        }],
                    )
                })
                .collect(),
            running: self.running,
            state: self.state().to_string(),
        }
    }
}

#[derive(Default)]
struct FakeState {
    containers: Vec<FakeContainer>,
    calls: Vec<String>,
    failing_inspect: HashSet<String>,
    create_failures: VecDeque<RuntimeError>,
    driver: StorageDriverInfo,
}

/// In-memory container runtime that records every call.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        fake.set_driver("overlay2", &[("Backing Filesystem", "extfs")]);
        Arc::new(fake)
    }

    pub fn seed(&self, container: FakeContainer) {
        self.state.lock().unwrap().containers.push(container);
    }

    pub fn fail_inspect(&self, name: &str) {
        self.state.lock().unwrap().failing_inspect.insert(name.to_string());
    }

    pub fn fail_next_create(&self, err: RuntimeError) {
        self.state.lock().unwrap().create_failures.push_back(err);
    }

    pub fn set_driver(&self, driver: &str, status: &[(&str, &str)]) {
        self.state.lock().unwrap().driver = StorageDriverInfo {
            driver: driver.to_string(),
            driver_status: status
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn find<'a>(containers: &'a mut [FakeContainer], key: &str) -> Option<&'a mut FakeContainer> {
    containers.iter_mut().find(|c| c.name == key || c.id == key)
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self, all: bool) -> RuntimeResult<Vec<ContainerEntry>> {
        self.record(format!("list all={}", all));
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.running)
            .map(FakeContainer::entry)
            .collect())
    }

    async fn inspect(&self, name: &str) -> RuntimeResult<ContainerDetails> {
        self.record(format!("inspect {}", name));
        let mut state = self.state.lock().unwrap();
        let container = find(&mut state.containers, name)
            .map(|c| c.clone())
            .ok_or_else(|| RuntimeError::NotFound(format!("No such container: {}", name)))?;
        if state.failing_inspect.contains(&container.name) {
            return Err(RuntimeError::Call("inspect timed out".to_string()));
        }
        Ok(container.details())
    }

    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<String> {
        self.record(format!("create {}", spec.name));
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.create_failures.pop_front() {
            return Err(err);
        }
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(RuntimeError::Conflict(format!(
                "The container name \"/{}\" is already in use",
                spec.name
            )));
        }
        for (host, _) in &spec.port_bindings {
            let taken = state
                .containers
                .iter()
                .any(|c| c.running && c.ports.iter().any(|(h, _)| h == host));
            if taken {
                return Err(RuntimeError::PortInUse(format!(
                    "Bind for 0.0.0.0:{} failed: port is already allocated",
                    host
                )));
            }
        }

        let container = FakeContainer {
            id: format!("id-{}", spec.name),
            name: spec.name.clone(),
            image: spec.image.clone(),
            hostname: spec.hostname.clone(),
            labels: spec.labels.clone(),
            memory: spec.memory,
            nano_cpus: spec.nano_cpus,
            storage_opt: spec
                .storage_size
                .iter()
                .map(|size| ("size".to_string(), size.clone()))
                .collect(),
            ports: spec.port_bindings.clone(),
            running: true,
        };
        let id = container.id.clone();
        state.containers.push(container);
        Ok(id)
    }

    async fn start(&self, name: &str) -> RuntimeResult<()> {
        self.record(format!("start {}", name));
        let mut state = self.state.lock().unwrap();
        let container = find(&mut state.containers, name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        container.running = true;
        Ok(())
    }

    async fn stop(&self, name: &str) -> RuntimeResult<()> {
        self.record(format!("stop {}", name));
        let mut state = self.state.lock().unwrap();
        let container = find(&mut state.containers, name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        container.running = false;
        Ok(())
    }

    async fn remove(&self, name: &str, _force: bool) -> RuntimeResult<()> {
        self.record(format!("remove {}", name));
        let mut state = self.state.lock().unwrap();
        let before = state.containers.len();
        state.containers.retain(|c| c.name != name && c.id != name);
        if state.containers.len() == before {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn storage_driver(&self) -> RuntimeResult<StorageDriverInfo> {
        self.record("info".to_string());
        Ok(self.state.lock().unwrap().driver.clone())
    }

    async fn usage(&self) -> RuntimeResult<Vec<UsageSample>> {
        self.record("stats".to_string());
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| UsageSample {
                name: c.name.clone(),
                image: c.image.clone(),
                cpu_percent: 1.5,
                memory_usage: (c.memory / 4) as u64,
                memory_limit: c.memory as u64,
            })
            .collect())
    }
}

pub fn manager_with(fake: &Arc<FakeRuntime>, config: VpsConfig) -> InstanceManager {
    InstanceManager::new(fake.clone(), Arc::new(config))
}

pub fn manager(fake: &Arc<FakeRuntime>) -> InstanceManager {
    manager_with(fake, VpsConfig::default())
}

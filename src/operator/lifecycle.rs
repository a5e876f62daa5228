use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::error::{Result, ValidationError, VpsError};
use super::inventory::{Inventory, PreImage};
use super::ports::{allocate_pair, allocate_preferring, PortPair};
use super::probe::storage_quota_supported;
use super::spec::{resolve, resolve_edit, validate_name, InstanceSpec, Limit, RawEditInput, RawInstanceInput};
use super::{DESCRIPTION_LABEL, IMAGE_LABEL, STORAGE_LABEL};
use crate::docker::{
    ContainerRuntime, ContainerSpec, InstanceStatus, RuntimeError, SSH_CONTAINER_PORT,
    WEB_CONTAINER_PORT,
};
use crate::shared::VpsConfig;

/// What happened to the requested storage size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StorageOutcome {
    Applied { size: String },
    /// The runtime cannot enforce disk quotas here, so the size was dropped.
    Ignored { requested: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedInstance {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub ssh_port: u16,
    pub web_port: u16,
    pub ram: String,
    pub cpu: String,
    pub storage: StorageOutcome,
    pub description: String,
}

/// Drives create, toggle, delete and edit against the runtime.
///
/// Holds no instance state: port usage and prior configuration are read back
/// from the runtime at the start of every operation.
pub struct InstanceManager {
    runtime: Arc<dyn ContainerRuntime>,
    config: Arc<VpsConfig>,
    inventory: Inventory,
}

impl InstanceManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: Arc<VpsConfig>) -> Self {
        let inventory = Inventory::new(runtime.clone(), config.clone());
        Self {
            runtime,
            config,
            inventory,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn config(&self) -> &VpsConfig {
        &self.config
    }

    /// Validates raw input and creates the instance. Invalid input never
    /// reaches the runtime.
    pub async fn provision(&self, raw: RawInstanceInput) -> Result<CreatedInstance> {
        let spec = resolve(raw, &self.config)?;
        self.create(spec).await
    }

    pub async fn create(&self, spec: InstanceSpec) -> Result<CreatedInstance> {
        let used = self.bound_ports(&spec.name).await?;
        let ports = allocate_pair(&used, self.config.port_floor)?;
        self.launch(&spec, ports).await
    }

    /// Stops a running instance, starts anything else. Returns the new state.
    pub async fn toggle(&self, name: &str) -> Result<InstanceStatus> {
        let details = self
            .runtime
            .inspect(name)
            .await
            .map_err(|e| VpsError::runtime("inspect", name, e))?;

        if details.running {
            self.runtime
                .stop(name)
                .await
                .map_err(|e| VpsError::runtime("stop", name, e))?;
            info!(name, "Instance stopped");
            Ok(InstanceStatus::Stopped)
        } else {
            self.runtime
                .start(name)
                .await
                .map_err(|e| VpsError::runtime("start", name, e))?;
            info!(name, "Instance started");
            Ok(InstanceStatus::Running)
        }
    }

    /// Force-removes the instance. Removing an absent instance succeeds.
    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.runtime.remove(name, true).await {
            Ok(()) => {
                info!(name, "Instance deleted");
                Ok(())
            }
            Err(RuntimeError::NotFound(_)) => {
                info!(name, "Instance already absent");
                Ok(())
            }
            Err(e) => Err(VpsError::runtime("delete", name, e)),
        }
    }

    /// Replaces the instance with one carrying the new settings.
    ///
    /// Sequence: record the pre-image, destroy, recompute bound ports,
    /// recreate under the same name, keeping the old ports where still free.
    /// The image is always the one the instance was created with. If the
    /// recreate fails the instance is gone and [`VpsError::NonAtomicEdit`]
    /// carries the pre-image.
    pub async fn edit(&self, name: &str, raw: RawEditInput) -> Result<CreatedInstance> {
        validate_name(name)?;
        let edit = resolve_edit(raw)?;

        let pre_image = match self.inventory.pre_image(name).await {
            Ok(pre_image) => pre_image,
            Err(e) => {
                warn!("Error getting current details for {}: {}; falling back to defaults", name, e);
                PreImage::default()
            }
        };

        // Edit never recreates something this system would not have created.
        if let Some(image) = pre_image.image.as_deref() {
            if !self.config.is_managed_image(image) {
                return Err(ValidationError::InvalidImage {
                    image: image.to_string(),
                    allowed: self.config.managed_images.join(", "),
                }
                .into());
            }
        }

        let spec = InstanceSpec {
            name: name.to_string(),
            hostname: edit
                .hostname
                .or_else(|| pre_image.hostname.clone())
                .unwrap_or_else(|| name.to_string()),
            image: pre_image
                .image
                .clone()
                .unwrap_or_else(|| self.config.default_image().to_string()),
            ram: match edit.ram {
                Some(ram) => ram,
                None => recovered(pre_image.ram.as_deref(), &self.config.default_ram, Limit::memory)?,
            },
            cpu: match edit.cpu {
                Some(cpu) => cpu,
                None => recovered(pre_image.cpu.as_deref(), &self.config.default_cpu, Limit::cpu)?,
            },
            storage: recovered(
                pre_image.storage.as_deref(),
                &self.config.default_storage,
                Limit::storage,
            )?,
            description: edit
                .description
                .or_else(|| pre_image.description.clone())
                .unwrap_or_default(),
        };

        // Nothing has been destroyed if this fails.
        self.delete(name).await?;

        let recreated: Result<CreatedInstance> = async {
            let used = self.bound_ports(name).await?;
            let ports = allocate_preferring(
                &used,
                self.config.port_floor,
                pre_image.ssh_port,
                pre_image.web_port,
            )?;
            self.launch(&spec, ports).await
        }
        .await;

        recreated.map_err(|source| {
            error!(
                name,
                previous = ?pre_image,
                "Edit removed the instance but recreating it failed: {}",
                source
            );
            VpsError::NonAtomicEdit {
                name: name.to_string(),
                pre_image: Box::new(pre_image),
                source: Box::new(source),
            }
        })
    }

    async fn bound_ports(&self, name: &str) -> Result<BTreeSet<u16>> {
        self.runtime
            .bound_host_ports()
            .await
            .map_err(|e| VpsError::runtime("list ports", name, e))
    }

    async fn launch(&self, spec: &InstanceSpec, ports: PortPair) -> Result<CreatedInstance> {
        let quota = storage_quota_supported(self.runtime.as_ref(), self.config.storage_quota).await;

        let mut labels = HashMap::from([(IMAGE_LABEL.to_string(), spec.image.clone())]);
        if !spec.description.is_empty() {
            labels.insert(DESCRIPTION_LABEL.to_string(), spec.description.clone());
        }

        let storage = if quota {
            labels.insert(STORAGE_LABEL.to_string(), spec.storage.token.clone());
            StorageOutcome::Applied {
                size: spec.storage.token.clone(),
            }
        } else {
            info!(name = %spec.name, requested = %spec.storage.token, "Storage quota not supported, skipping size limit");
            StorageOutcome::Ignored {
                requested: spec.storage.token.clone(),
            }
        };

        let container = ContainerSpec {
            name: spec.name.clone(),
            hostname: spec.hostname.clone(),
            image: spec.image.clone(),
            port_bindings: vec![
                (ports.ssh, SSH_CONTAINER_PORT),
                (ports.web, WEB_CONTAINER_PORT),
            ],
            memory: spec.ram.value,
            nano_cpus: spec.cpu.value,
            storage_size: quota.then(|| spec.storage.token.clone()),
            labels,
        };

        let id = self
            .runtime
            .create(&container)
            .await
            .map_err(|e| VpsError::runtime("create", &spec.name, e))?;

        info!(
            name = %spec.name,
            image = %spec.image,
            ssh_port = ports.ssh,
            web_port = ports.web,
            "Instance created"
        );

        Ok(CreatedInstance {
            id,
            name: spec.name.clone(),
            hostname: spec.hostname.clone(),
            image: spec.image.clone(),
            ssh_port: ports.ssh,
            web_port: ports.web,
            ram: spec.ram.token.clone(),
            cpu: spec.cpu.token.clone(),
            storage,
            description: spec.description.clone(),
        })
    }
}

/// A value read back from the old instance, or the default when it is missing
/// or unreadable.
fn recovered(
    value: Option<&str>,
    default: &str,
    parse: fn(&str) -> std::result::Result<Limit, ValidationError>,
) -> Result<Limit> {
    if let Some(limit) = value.and_then(|v| parse(v).ok()) {
        return Ok(limit);
    }
    Ok(parse(default)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovered_prefers_previous_value() {
        let limit = recovered(Some("1G"), "512m", Limit::memory).unwrap();
        assert_eq!(limit.token, "1G");
        assert_eq!(limit.value, 1_073_741_824);
    }

    #[test]
    fn test_recovered_falls_back_to_default() {
        assert_eq!(recovered(None, "0.5", Limit::cpu).unwrap().value, 500_000_000);
        // An unreadable previous value is treated as missing.
        assert_eq!(recovered(Some("N/A"), "10G", Limit::storage).unwrap().token, "10G");
    }

    #[test]
    fn test_storage_outcome_serialization() {
        let applied = serde_json::to_value(StorageOutcome::Applied { size: "10G".into() }).unwrap();
        assert_eq!(applied, serde_json::json!({ "status": "applied", "size": "10G" }));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::error::{Result, VpsError};
use super::units::{format_binary, format_cpu, format_memory, format_percent, NOT_AVAILABLE};
use super::{DESCRIPTION_LABEL, IMAGE_LABEL, STORAGE_LABEL};
use crate::docker::{
    ContainerDetails, ContainerEntry, ContainerRuntime, InstanceStatus, RuntimeError,
    SSH_PORT_KEY, WEB_PORT_KEY,
};
use crate::shared::VpsConfig;

/// Whether an instance's configuration could be read for this view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum InspectionOutcome {
    Complete,
    /// Fields other than id, name, image and status are placeholders.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstanceView {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub image: String,
    /// Runtime status text, e.g. `Up 3 minutes`.
    pub status: String,
    pub state: InstanceStatus,
    pub ssh_port: String,
    pub web_port: String,
    pub ram: String,
    pub cpu: String,
    pub storage: String,
    pub description: String,
    pub inspection: InspectionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageSnapshot {
    pub name: String,
    pub image: String,
    pub cpu_percent: String,
    pub mem_usage: String,
    pub mem_percent: String,
    pub sampled_at: DateTime<Utc>,
}

/// What an instance looked like before an edit destroyed it. Fields that could
/// not be read are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreImage {
    pub hostname: Option<String>,
    pub image: Option<String>,
    pub ram: Option<String>,
    pub cpu: Option<String>,
    pub storage: Option<String>,
    pub description: Option<String>,
    pub ssh_port: Option<u16>,
    pub web_port: Option<u16>,
}

impl PreImage {
    pub fn from_details(details: &ContainerDetails) -> Self {
        Self {
            hostname: Some(details.hostname.clone()).filter(|h| !h.is_empty()),
            image: Some(logical_image(&details.labels, &details.image).to_string())
                .filter(|i| !i.is_empty()),
            ram: available(format_memory(details.memory)),
            cpu: available(format_cpu(details.nano_cpus)),
            storage: storage_size(details),
            description: details.labels.get(DESCRIPTION_LABEL).cloned(),
            ssh_port: bound_port(details, SSH_PORT_KEY),
            web_port: bound_port(details, WEB_PORT_KEY),
        }
    }
}

/// Rebuilds the managed inventory from the live runtime on every call.
pub struct Inventory {
    runtime: Arc<dyn ContainerRuntime>,
    config: Arc<VpsConfig>,
}

impl Inventory {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: Arc<VpsConfig>) -> Self {
        Self { runtime, config }
    }

    /// Every container, running or not, whose logical image is allow-listed.
    pub async fn managed_instances(&self) -> Result<Vec<ContainerEntry>> {
        let containers = self
            .runtime
            .list_containers(true)
            .await
            .map_err(|e| VpsError::runtime("list", "containers", e))?;

        Ok(containers
            .into_iter()
            .filter(|c| self.config.is_managed_image(logical_image(&c.labels, &c.image)))
            .collect())
    }

    /// One view per managed instance. An instance that fails inspection is
    /// still listed, with placeholder fields.
    pub async fn list(&self) -> Result<Vec<InstanceView>> {
        let entries = self.managed_instances().await?;
        let mut views = Vec::with_capacity(entries.len());

        for entry in entries {
            let key = if entry.id.is_empty() { &entry.name } else { &entry.id };
            let view = match self.runtime.inspect(key).await {
                Ok(details) => view_from_details(&entry, &details),
                Err(e) => {
                    warn!("Error inspecting container {}: {}", entry.name, e);
                    placeholder_view(&entry, e.to_string())
                }
            };
            views.push(view);
        }

        debug!(count = views.len(), "Reconciled inventory");
        Ok(views)
    }

    /// Live usage of running managed instances only.
    pub async fn monitor(&self) -> Result<Vec<UsageSnapshot>> {
        let managed: HashMap<String, String> = self
            .managed_instances()
            .await?
            .into_iter()
            .map(|c| {
                let image = logical_image(&c.labels, &c.image).to_string();
                (c.name, image)
            })
            .collect();

        let samples = self
            .runtime
            .usage()
            .await
            .map_err(|e| VpsError::runtime("usage", "containers", e))?;

        let sampled_at = Utc::now();
        Ok(samples
            .into_iter()
            .filter_map(|s| managed.get(&s.name).map(|image| (s, image.clone())))
            .map(|(s, image)| {
                let mem_percent = if s.memory_limit > 0 {
                    s.memory_usage as f64 / s.memory_limit as f64 * 100.0
                } else {
                    0.0
                };
                UsageSnapshot {
                    mem_usage: format!(
                        "{} / {}",
                        format_binary(s.memory_usage),
                        format_binary(s.memory_limit)
                    ),
                    mem_percent: format_percent(mem_percent),
                    cpu_percent: format_percent(s.cpu_percent),
                    name: s.name,
                    image,
                    sampled_at,
                }
            })
            .collect())
    }

    /// Configuration of one instance, for callers about to replace it.
    pub async fn pre_image(&self, name: &str) -> Result<PreImage> {
        match self.runtime.inspect(name).await {
            Ok(details) => Ok(PreImage::from_details(&details)),
            Err(RuntimeError::NotFound(_)) => Err(VpsError::NotFound(name.to_string())),
            Err(e) => Err(VpsError::Inspection {
                name: name.to_string(),
                detail: e.to_string(),
            }),
        }
    }
}

/// The image an instance was created as: its identity label when present,
/// otherwise the runtime's own image reference.
pub fn logical_image<'a>(labels: &'a HashMap<String, String>, image: &'a str) -> &'a str {
    labels
        .get(IMAGE_LABEL)
        .map(String::as_str)
        .filter(|i| !i.is_empty())
        .unwrap_or(image)
}

fn view_from_details(entry: &ContainerEntry, details: &ContainerDetails) -> InstanceView {
    InstanceView {
        id: entry.id.clone(),
        name: entry.name.clone(),
        hostname: if details.hostname.is_empty() {
            entry.name.clone()
        } else {
            details.hostname.clone()
        },
        image: logical_image(&entry.labels, &entry.image).to_string(),
        status: entry.status.clone(),
        state: InstanceStatus::from_state(&entry.state),
        ssh_port: display_port(details, SSH_PORT_KEY),
        web_port: display_port(details, WEB_PORT_KEY),
        ram: format_memory(details.memory),
        cpu: format_cpu(details.nano_cpus),
        storage: storage_size(details).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        description: details.labels.get(DESCRIPTION_LABEL).cloned().unwrap_or_default(),
        inspection: InspectionOutcome::Complete,
    }
}

fn placeholder_view(entry: &ContainerEntry, reason: String) -> InstanceView {
    InstanceView {
        id: entry.id.clone(),
        name: entry.name.clone(),
        hostname: String::new(),
        image: logical_image(&entry.labels, &entry.image).to_string(),
        status: entry.status.clone(),
        state: InstanceStatus::from_state(&entry.state),
        ssh_port: NOT_AVAILABLE.to_string(),
        web_port: NOT_AVAILABLE.to_string(),
        ram: NOT_AVAILABLE.to_string(),
        cpu: NOT_AVAILABLE.to_string(),
        storage: NOT_AVAILABLE.to_string(),
        description: String::new(),
        inspection: InspectionOutcome::Failed { reason },
    }
}

fn display_port(details: &ContainerDetails, key: &str) -> String {
    details
        .ports
        .get(key)
        .and_then(|bindings| bindings.iter().find(|b| !b.host_port.is_empty()))
        .map(|b| match b.host_ip.as_str() {
            "" | "0.0.0.0" | "::" => b.host_port.clone(),
            ip => format!("{}:{}", ip, b.host_port),
        })
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn bound_port(details: &ContainerDetails, key: &str) -> Option<u16> {
    details
        .ports
        .get(key)?
        .iter()
        .find_map(|b| b.host_port.parse().ok())
}

fn storage_size(details: &ContainerDetails) -> Option<String> {
    details
        .storage_opt
        .get("size")
        .or_else(|| details.labels.get(STORAGE_LABEL))
        .filter(|s| !s.is_empty())
        .cloned()
}

fn available(value: String) -> Option<String> {
    Some(value).filter(|v| v != NOT_AVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::HostBinding;

    fn details() -> ContainerDetails {
        ContainerDetails {
            id: "abc".to_string(),
            name: "web1".to_string(),
            hostname: "web1.local".to_string(),
            image: "vps-image".to_string(),
            labels: HashMap::from([
                (DESCRIPTION_LABEL.to_string(), "blog".to_string()),
                (IMAGE_LABEL.to_string(), "vps-image".to_string()),
            ]),
            memory: 536_870_912,
            nano_cpus: 500_000_000,
            storage_opt: HashMap::new(),
            ports: HashMap::from([
                (
                    SSH_PORT_KEY.to_string(),
                    vec![
                        HostBinding { host_ip: "0.0.0.0".to_string(), host_port: "20005".to_string() },
                        HostBinding { host_ip: "::".to_string(), host_port: "20005".to_string() },
                    ],
                ),
                (
                    WEB_PORT_KEY.to_string(),
                    vec![HostBinding { host_ip: "127.0.0.1".to_string(), host_port: "20006".to_string() }],
                ),
            ]),
            running: true,
            state: "running".to_string(),
        }
    }

    #[test]
    fn test_pre_image_from_details() {
        let pre = PreImage::from_details(&details());
        assert_eq!(pre.hostname.as_deref(), Some("web1.local"));
        assert_eq!(pre.image.as_deref(), Some("vps-image"));
        assert_eq!(pre.ram.as_deref(), Some("512m"));
        assert_eq!(pre.cpu.as_deref(), Some("0.5"));
        assert_eq!(pre.description.as_deref(), Some("blog"));
        assert_eq!(pre.ssh_port, Some(20005));
        assert_eq!(pre.web_port, Some(20006));
        assert_eq!(pre.storage, None);
    }

    #[test]
    fn test_pre_image_of_unlimited_container() {
        let mut d = details();
        d.memory = 0;
        d.nano_cpus = 0;
        d.ports.clear();
        d.labels.clear();

        let pre = PreImage::from_details(&d);
        assert_eq!(pre.ram, None);
        assert_eq!(pre.cpu, None);
        assert_eq!(pre.ssh_port, None);
        assert_eq!(pre.description, None);
        // Falls back to the runtime's image reference.
        assert_eq!(pre.image.as_deref(), Some("vps-image"));
    }

    #[test]
    fn test_display_port_formats_host_ip() {
        let d = details();
        assert_eq!(display_port(&d, SSH_PORT_KEY), "20005");
        assert_eq!(display_port(&d, WEB_PORT_KEY), "127.0.0.1:20006");
        assert_eq!(display_port(&d, "443/tcp"), "N/A");
    }

    #[test]
    fn test_logical_image_prefers_label() {
        let labels = HashMap::from([(IMAGE_LABEL.to_string(), "vps-image".to_string())]);
        assert_eq!(logical_image(&labels, "sha256:deadbeef"), "vps-image");
        assert_eq!(logical_image(&HashMap::new(), "ubuntu"), "ubuntu");
    }

    #[test]
    fn test_storage_prefers_applied_option() {
        let mut d = details();
        d.labels.insert(STORAGE_LABEL.to_string(), "10G".to_string());
        assert_eq!(storage_size(&d).as_deref(), Some("10G"));

        d.storage_opt.insert("size".to_string(), "20G".to_string());
        assert_eq!(storage_size(&d).as_deref(), Some("20G"));
    }
}

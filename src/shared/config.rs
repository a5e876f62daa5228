use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_RAM: &str = "512m";
pub const DEFAULT_CPU: &str = "0.5";
pub const DEFAULT_STORAGE: &str = "10G";
pub const DEFAULT_IMAGE: &str = "vps-image";
pub const DEFAULT_PORT_FLOOR: u16 = 20000;

/// Whether `--storage-opt size=` is applied to new instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaMode {
    /// Ask the runtime's storage driver.
    Auto,
    Enabled,
    Disabled,
}

impl FromStr for QuotaMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(QuotaMode::Auto),
            "enabled" | "on" | "true" => Ok(QuotaMode::Enabled),
            "disabled" | "off" | "false" => Ok(QuotaMode::Disabled),
            other => bail!("invalid storage quota mode '{}': expected auto, enabled or disabled", other),
        }
    }
}

/// Process-wide settings. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VpsConfig {
    pub default_ram: String,
    pub default_cpu: String,
    pub default_storage: String,
    /// Allow-list of images this system creates and tracks. The first entry is
    /// used when a request names no image.
    pub managed_images: Vec<String>,
    pub port_floor: u16,
    pub storage_quota: QuotaMode,
    pub docker_socket: Option<String>,
    pub log_dir: String,
    pub host: String,
    pub port: u16,
}

impl Default for VpsConfig {
    fn default() -> Self {
        Self {
            default_ram: DEFAULT_RAM.to_string(),
            default_cpu: DEFAULT_CPU.to_string(),
            default_storage: DEFAULT_STORAGE.to_string(),
            managed_images: vec![DEFAULT_IMAGE.to_string()],
            port_floor: DEFAULT_PORT_FLOOR,
            storage_quota: QuotaMode::Auto,
            docker_socket: None,
            log_dir: "./logs".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl VpsConfig {
    /// Defaults, then the YAML file (explicit path or `~/.vpsman/config.yaml`),
    /// then `VPS_*` environment variables.
    ///
    /// Runs before logging is up, so nothing here logs; see [`Self::source_file`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::source_file(path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// The YAML file [`Self::load`] reads, if any.
    pub fn source_file(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file().filter(|p| p.exists()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VPS_DEFAULT_RAM") {
            self.default_ram = v;
        }
        if let Some(v) = lookup("VPS_DEFAULT_CPU") {
            self.default_cpu = v;
        }
        if let Some(v) = lookup("VPS_DEFAULT_STORAGE") {
            self.default_storage = v;
        }
        if let Some(v) = lookup("VPS_MANAGED_IMAGES") {
            self.managed_images = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("VPS_PORT_FLOOR") {
            self.port_floor = v
                .trim()
                .parse()
                .with_context(|| format!("VPS_PORT_FLOOR is not a port number: {}", v))?;
        }
        if let Some(v) = lookup("VPS_STORAGE_QUOTA") {
            self.storage_quota = v.parse()?;
        }
        if let Some(v) = lookup("VPS_DOCKER_SOCKET") {
            self.docker_socket = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("VPS_LOG_DIR") {
            self.log_dir = v;
        }
        if let Some(v) = lookup("VPS_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("VPS_PORT") {
            self.port = v
                .trim()
                .parse()
                .with_context(|| format!("VPS_PORT is not a port number: {}", v))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.managed_images.is_empty() {
            bail!("managed_images must name at least one image");
        }
        if self.port_floor == 0 {
            bail!("port_floor must be greater than zero");
        }
        Ok(())
    }

    pub fn default_image(&self) -> &str {
        self.managed_images
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_IMAGE)
    }

    pub fn is_managed_image(&self, image: &str) -> bool {
        self.managed_images.iter().any(|i| i == image)
    }
}

fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vpsman").join("config.yaml"))
}

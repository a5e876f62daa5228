//! Turns loosely-typed request fields into validated instance specifications.
//!
//! Everything here is pure; nothing touches the runtime.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::ValidationError;
use super::units::{parse_cpu, parse_size};
use crate::shared::VpsConfig;

/// Creation fields exactly as submitted. Every field is optional here;
/// [`resolve`] decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RawInstanceInput {
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub image: Option<String>,
    pub ram: Option<String>,
    pub cpu: Option<String>,
    pub storage: Option<String>,
    pub description: Option<String>,
}

/// Edit fields as submitted. The image cannot be changed by an edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RawEditInput {
    pub hostname: Option<String>,
    pub ram: Option<String>,
    pub cpu: Option<String>,
    pub description: Option<String>,
}

/// A resource limit as typed by the user plus its runtime-native value
/// (bytes for sizes, nano-CPUs for CPU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Limit {
    pub token: String,
    pub value: i64,
}

impl Limit {
    pub fn memory(token: &str) -> Result<Self, ValidationError> {
        Self::parse("ram", token, parse_size)
    }

    pub fn cpu(token: &str) -> Result<Self, ValidationError> {
        Self::parse("cpu", token, parse_cpu)
    }

    pub fn storage(token: &str) -> Result<Self, ValidationError> {
        Self::parse("storage", token, parse_size)
    }

    fn parse(
        field: &'static str,
        token: &str,
        parser: fn(&str) -> Result<i64, String>,
    ) -> Result<Self, ValidationError> {
        let token = token.trim();
        let value = parser(token).map_err(|reason| ValidationError::InvalidLimit {
            field,
            value: token.to_string(),
            reason,
        })?;
        Ok(Self {
            token: token.to_string(),
            value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub ram: Limit,
    pub cpu: Limit,
    pub storage: Limit,
    pub description: String,
}

/// Validated edit. `None` keeps whatever the instance had before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSpec {
    pub hostname: Option<String>,
    pub ram: Option<Limit>,
    pub cpu: Option<Limit>,
    pub description: Option<String>,
}

pub fn resolve(raw: RawInstanceInput, config: &VpsConfig) -> Result<InstanceSpec, ValidationError> {
    let name = non_empty(raw.name).ok_or(ValidationError::MissingField("name"))?;
    validate_name(&name)?;

    let hostname = non_empty(raw.hostname).unwrap_or_else(|| name.clone());

    let image = match non_empty(raw.image) {
        Some(image) if config.is_managed_image(&image) => image,
        Some(image) => {
            return Err(ValidationError::InvalidImage {
                image,
                allowed: config.managed_images.join(", "),
            })
        }
        None => config.default_image().to_string(),
    };

    let ram = Limit::memory(&non_empty(raw.ram).unwrap_or_else(|| config.default_ram.clone()))?;
    let cpu = Limit::cpu(&non_empty(raw.cpu).unwrap_or_else(|| config.default_cpu.clone()))?;
    let storage =
        Limit::storage(&non_empty(raw.storage).unwrap_or_else(|| config.default_storage.clone()))?;

    Ok(InstanceSpec {
        name,
        hostname,
        image,
        ram,
        cpu,
        storage,
        description: raw.description.unwrap_or_default(),
    })
}

pub fn resolve_edit(raw: RawEditInput) -> Result<EditSpec, ValidationError> {
    Ok(EditSpec {
        hostname: non_empty(raw.hostname),
        ram: non_empty(raw.ram).map(|t| Limit::memory(&t)).transpose()?,
        cpu: non_empty(raw.cpu).map(|t| Limit::cpu(&t)).transpose()?,
        description: raw.description,
    })
}

/// Container names: a letter or digit, then letters, digits, `_`, `.` or `-`.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

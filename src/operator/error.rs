use thiserror::Error;

use super::inventory::PreImage;
use crate::docker::RuntimeError;

/// Bad input, rejected before any runtime call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid instance name '{0}': must start with a letter or digit and contain only letters, digits, '_', '.' or '-'")]
    InvalidName(String),

    #[error("image '{image}' is not a managed image (allowed: {allowed})")]
    InvalidImage { image: String, allowed: String },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidLimit {
        field: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum VpsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("instance not found: {0}")]
    NotFound(String),

    /// Another caller bound the port between allocation and bind. Retrying
    /// recomputes the free ports.
    #[error("host port conflict for {name}: {detail}")]
    PortConflict { name: String, detail: String },

    #[error("no free host port at or above {floor}")]
    PortsExhausted { floor: u16 },

    #[error("{op} failed for {name}: {detail}")]
    Runtime {
        op: &'static str,
        name: String,
        detail: String,
    },

    #[error("failed to inspect {name}: {detail}")]
    Inspection { name: String, detail: String },

    /// The old instance was destroyed and the replacement could not be
    /// created. The instance no longer exists; `pre_image` is what it was.
    #[error("edit of {name} removed the instance but recreating it failed: {source}")]
    NonAtomicEdit {
        name: String,
        pre_image: Box<PreImage>,
        #[source]
        source: Box<VpsError>,
    },
}

pub type Result<T> = std::result::Result<T, VpsError>;

impl VpsError {
    pub(crate) fn runtime(op: &'static str, name: &str, err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(_) => VpsError::NotFound(name.to_string()),
            RuntimeError::PortInUse(detail) => VpsError::PortConflict {
                name: name.to_string(),
                detail,
            },
            RuntimeError::Conflict(detail) | RuntimeError::Call(detail) => VpsError::Runtime {
                op,
                name: name.to_string(),
                detail,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, VpsError::PortConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_mapping() {
        let err = VpsError::runtime("create", "web1", RuntimeError::PortInUse("Bind for 0.0.0.0:20000 failed".into()));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("20000"));

        let err = VpsError::runtime("toggle", "web1", RuntimeError::NotFound("No such container".into()));
        assert!(matches!(err, VpsError::NotFound(ref n) if n == "web1"));
        assert!(!err.is_retryable());

        let err = VpsError::runtime("create", "web1", RuntimeError::Conflict("name in use".into()));
        assert!(matches!(err, VpsError::Runtime { op: "create", .. }));
        assert!(err.to_string().contains("name in use"));
    }

    #[test]
    fn test_non_atomic_edit_is_not_retryable() {
        let err = VpsError::NonAtomicEdit {
            name: "web1".to_string(),
            pre_image: Box::new(PreImage::default()),
            source: Box::new(VpsError::PortConflict {
                name: "web1".to_string(),
                detail: "port is already allocated".to_string(),
            }),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("recreating it failed"));
    }

    #[test]
    fn test_validation_display() {
        let err = ValidationError::InvalidImage {
            image: "alpine".to_string(),
            allowed: "vps-image".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "image 'alpine' is not a managed image (allowed: vps-image)"
        );
    }
}

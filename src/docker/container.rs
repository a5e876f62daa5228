use bollard::models::ContainerStateStatusEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Run state of an instance as last reported by the runtime. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Other,
}

impl InstanceStatus {
    /// Interprets the machine state string of a listing or inspect record.
    pub fn from_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => InstanceStatus::Running,
            "exited" | "created" => InstanceStatus::Stopped,
            _ => InstanceStatus::Other,
        }
    }
}

impl From<ContainerStateStatusEnum> for InstanceStatus {
    fn from(status: ContainerStateStatusEnum) -> Self {
        InstanceStatus::from_state(state_name(status))
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Other => "other",
        };
        f.write_str(s)
    }
}

pub(crate) fn state_name(status: ContainerStateStatusEnum) -> &'static str {
    match status {
        ContainerStateStatusEnum::CREATED => "created",
        ContainerStateStatusEnum::RUNNING => "running",
        ContainerStateStatusEnum::PAUSED => "paused",
        ContainerStateStatusEnum::RESTARTING => "restarting",
        ContainerStateStatusEnum::REMOVING => "removing",
        ContainerStateStatusEnum::EXITED => "exited",
        ContainerStateStatusEnum::DEAD => "dead",
        _ => "",
    }
}

mod error;
mod inventory;
mod lifecycle;
pub mod ports;
pub mod probe;
pub mod spec;
pub mod units;

pub use error::{Result, ValidationError, VpsError};
pub use inventory::{logical_image, InspectionOutcome, InstanceView, Inventory, PreImage, UsageSnapshot};
pub use lifecycle::{CreatedInstance, InstanceManager, StorageOutcome};
pub use ports::PortPair;
pub use spec::{EditSpec, InstanceSpec, Limit, RawEditInput, RawInstanceInput};

/// Free-form description, which the runtime has no native field for.
pub const DESCRIPTION_LABEL: &str = "com.myvpsapp.description";
/// Image the instance was created as, independent of the runtime's reference.
pub const IMAGE_LABEL: &str = "com.myvpsapp.image";
/// Storage size applied at creation, re-applied by edits.
pub const STORAGE_LABEL: &str = "com.myvpsapp.storage";

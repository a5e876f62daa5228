use tracing::{debug, warn};

use crate::docker::{ContainerRuntime, StorageDriverInfo};
use crate::shared::QuotaMode;

/// Whether storage size limits can be enforced for new instances.
///
/// Never fails: a probe error means "not supported", since quota is optional.
pub async fn storage_quota_supported(runtime: &dyn ContainerRuntime, mode: QuotaMode) -> bool {
    match mode {
        QuotaMode::Enabled => true,
        QuotaMode::Disabled => false,
        QuotaMode::Auto => match runtime.storage_driver().await {
            Ok(info) => {
                let supported = driver_supports_quota(&info);
                debug!(driver = %info.driver, supported, "Probed storage quota support");
                supported
            }
            Err(e) => {
                warn!("Storage driver probe failed, treating quota as unsupported: {}", e);
                false
            }
        },
    }
}

/// overlay2 on an XFS backing filesystem mounted with project quotas.
pub fn driver_supports_quota(info: &StorageDriverInfo) -> bool {
    let haystack = std::iter::once(info.driver.as_str())
        .chain(
            info.driver_status
                .iter()
                .flat_map(|(k, v)| [k.as_str(), v.as_str()]),
        )
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    info.driver.eq_ignore_ascii_case("overlay2") && haystack.contains("xfs") && haystack.contains("pquota")
}

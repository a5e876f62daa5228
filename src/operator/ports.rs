use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::error::{Result, VpsError};

/// Host ports bound to an instance's SSH and web endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub ssh: u16,
    pub web: u16,
}

/// Smallest port at or above `floor` that is not in `used`.
pub fn find_free_port(used: &BTreeSet<u16>, floor: u16) -> Option<u16> {
    (floor..=u16::MAX).find(|port| !used.contains(port))
}

/// Fresh, distinct SSH and web ports, neither of which is in `used`.
pub fn allocate_pair(used: &BTreeSet<u16>, floor: u16) -> Result<PortPair> {
    allocate_preferring(used, floor, None, None)
}

/// Like [`allocate_pair`], but keeps each preferred port when it is still free.
///
/// SSH is settled first and reserved in a working copy of `used`, so the web
/// port can never land on it.
pub fn allocate_preferring(
    used: &BTreeSet<u16>,
    floor: u16,
    preferred_ssh: Option<u16>,
    preferred_web: Option<u16>,
) -> Result<PortPair> {
    let exhausted = || VpsError::PortsExhausted { floor };
    let mut working = used.clone();

    let ssh = match preferred_ssh.filter(|p| *p != 0 && !working.contains(p)) {
        Some(port) => port,
        None => find_free_port(&working, floor).ok_or_else(exhausted)?,
    };
    working.insert(ssh);

    let mut web = match preferred_web.filter(|p| *p != 0 && !working.contains(p)) {
        Some(port) => port,
        None => find_free_port(&working, floor).ok_or_else(exhausted)?,
    };
    while web == ssh {
        let next = web.checked_add(1).ok_or_else(exhausted)?;
        web = find_free_port(&working, next).ok_or_else(exhausted)?;
    }

    Ok(PortPair { ssh, web })
}

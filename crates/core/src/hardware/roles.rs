//! Operator-assigned GPU roles.
//!
//! A role labels what a GPU is for (`primary`, `worker`, `control`, ...)
//! and optionally names the service pinned to it. Roles come from
//! configuration as `index:role[:service]` entries separated by commas:
//!
//! ```text
//! GPU_ROLES=0:primary:comfyui,1:worker,4:worker:tts,5:control
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRole {
    pub role: String,
    /// Service hosted on the device, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl DeviceRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            service: None,
        }
    }

    pub fn hosting(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// GPU index to role.
pub type DeviceRoles = BTreeMap<u32, DeviceRole>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role entry {entry:?}: {reason}")]
pub struct RoleError {
    pub entry: String,
    pub reason: &'static str,
}

/// Parse a role list. Blank input yields no roles; a later entry for the
/// same index replaces an earlier one.
pub fn parse_roles(text: &str) -> Result<DeviceRoles, RoleError> {
    let mut roles = DeviceRoles::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = |reason| RoleError {
            entry: entry.to_string(),
            reason,
        };

        let mut parts = entry.splitn(3, ':').map(str::trim);
        let index = parts
            .next()
            .and_then(|i| i.parse::<u32>().ok())
            .ok_or_else(|| invalid("index is not a non-negative integer"))?;
        let role = parts
            .next()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid("role is missing"))?;
        let service = parts.next().filter(|s| !s.is_empty());

        let mut device_role = DeviceRole::new(role);
        device_role.service = service.map(str::to_string);
        roles.insert(index, device_role);
    }
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles_with_and_without_service() {
        let roles = parse_roles("0:primary:comfyui, 1:worker,4:worker:tts ,5:control").unwrap();
        assert_eq!(roles.len(), 4);
        assert_eq!(roles[&0], DeviceRole::new("primary").hosting("comfyui"));
        assert_eq!(roles[&1], DeviceRole::new("worker"));
        assert_eq!(roles[&4], DeviceRole::new("worker").hosting("tts"));
        assert_eq!(roles[&5], DeviceRole::new("control"));
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(parse_roles("").unwrap().is_empty());
        assert!(parse_roles(" , ").unwrap().is_empty());
    }

    #[test]
    fn empty_service_is_none() {
        let roles = parse_roles("2:worker:").unwrap();
        assert_eq!(roles[&2].service, None);
    }

    #[test]
    fn bad_index_is_rejected() {
        let err = parse_roles("0:primary,gpu1:worker").unwrap_err();
        assert_eq!(err.entry, "gpu1:worker");
    }

    #[test]
    fn missing_role_is_rejected() {
        assert!(parse_roles("3").is_err());
        assert!(parse_roles("3::comfyui").is_err());
    }
}

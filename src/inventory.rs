//! Inventory loading and target resolution.
//!
//! The inventory is a YAML map of host name to host configuration:
//!
//! ```yaml
//! edge-1:
//!   connection:
//!     hostname: 100.64.0.12
//!     username: op
//!     password: hunter2          # optional, first-contact bootstrap only
//!     ssh_key_path: ~/.ssh/edge  # optional
//!     port: 22
//!   services:
//!     compose_dir: /opt/stack
//!     systemd_services: [tailscaled]
//!   devices:
//!     lte-modem: { vendor_id: "1bc7", product_id: "1201" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_port() -> u16 {
    22
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssh_key_path: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesConfig {
    /// Remote directory scanned for compose files to discover containers.
    #[serde(default)]
    pub compose_dir: Option<String>,
    #[serde(default)]
    pub systemd_services: Vec<String>,
}

/// An expected USB device, matched against the target's enumeration by
/// vendor/product id (hex, with or without a `0x` prefix).
#[derive(Debug, Clone, Deserialize)]
pub struct UsbDeviceSpec {
    pub vendor_id: String,
    pub product_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub devices: BTreeMap<String, UsbDeviceSpec>,
}

/// One remote host to diagnose. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub address: String,
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub port: u16,
}

impl Target {
    fn from_host(name: &str, config: &HostConfig) -> Self {
        let conn = &config.connection;
        Self {
            name: name.to_string(),
            address: conn.hostname.clone(),
            username: conn.username.clone(),
            password: conn.password.clone(),
            key_path: conn.ssh_key_path.as_ref().map(PathBuf::from),
            port: conn.port,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    hosts: BTreeMap<String, HostConfig>,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Inventory(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::Inventory(format!("invalid inventory: {e}")))
    }

    /// Resolve a host name into a diagnosable target plus its probe
    /// configuration. Unknown names list the available hosts.
    pub fn target(&self, name: &str) -> Result<(Target, &HostConfig)> {
        let config = self.hosts.get(name).ok_or_else(|| {
            Error::Inventory(format!(
                "unknown host '{name}' (available: {})",
                self.hosts.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?;
        Ok((Target::from_host(name, config), config))
    }

    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
edge-1:
  connection:
    hostname: 100.64.0.12
    username: op
    password: hunter2
    ssh_key_path: ~/.ssh/edge
  services:
    compose_dir: /opt/stack
    systemd_services:
      - tailscaled
      - nginx
  devices:
    lte-modem:
      vendor_id: "1bc7"
      product_id: "1201"
edge-2:
  connection:
    hostname: 100.64.0.13
    username: op
    port: 2222
"#;

    #[test]
    fn parses_full_host() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        let (target, config) = inv.target("edge-1").unwrap();

        assert_eq!(target.address, "100.64.0.12");
        assert_eq!(target.username, "op");
        assert_eq!(target.password.as_deref(), Some("hunter2"));
        assert_eq!(target.key_path, Some(PathBuf::from("~/.ssh/edge")));
        assert_eq!(target.port, 22);

        assert_eq!(config.services.compose_dir.as_deref(), Some("/opt/stack"));
        assert_eq!(config.services.systemd_services, vec!["tailscaled", "nginx"]);
        assert_eq!(config.devices["lte-modem"].vendor_id, "1bc7");
    }

    #[test]
    fn optional_sections_default() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        let (target, config) = inv.target("edge-2").unwrap();

        assert_eq!(target.port, 2222);
        assert!(target.password.is_none());
        assert!(target.key_path.is_none());
        assert!(config.services.compose_dir.is_none());
        assert!(config.services.systemd_services.is_empty());
        assert!(config.devices.is_empty());
    }

    #[test]
    fn unknown_host_lists_available() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        let err = inv.target("edge-9").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("edge-9"));
        assert!(msg.contains("edge-1"));
        assert!(msg.contains("edge-2"));
    }

    #[test]
    fn invalid_yaml_is_an_inventory_error() {
        let err = Inventory::parse("edge-1: [not a mapping").unwrap_err();
        assert!(matches!(err, Error::Inventory(_)));
    }
}

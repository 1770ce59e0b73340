//! # Node Configuration
//!
//! Unified configuration for the service, loaded from a TOML file with
//! per-section defaults. A missing file yields the full default
//! configuration; a present file only needs the sections it overrides.
//!
//! Invalid blacklist or hidden-address entries are logged and skipped at
//! the point of use. The only fatal configuration state is one where no
//! admission policy exists at all (sustained limit of zero and the packet
//! guard disabled), which [`NodeConfig::admission`] surfaces on startup.

use std::path::Path;

use nm_ingress::{AdmissionConfig, AdmissionControl, AdmissionError, PacketGuardConfig};
use nm_netstate::TopologyConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Admission(#[from] AdmissionError),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub udp: UdpConfig,
    pub admission: AdmissionSection,
    pub topology: TopologySection,
    pub persistence: PersistenceSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file. A missing file is not an
    /// error; the defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Build the admission controller from the `[admission]` section.
    pub fn admission(&self) -> Result<AdmissionControl, ConfigError> {
        let guard = if self.admission.packet_guard.enabled {
            Some(PacketGuardConfig {
                packets_per_second: self.admission.packet_guard.packets_per_second,
                global_multiplier: self.admission.packet_guard.global_multiplier,
            })
        } else {
            None
        };
        let config = AdmissionConfig {
            sustained_limit: self.admission.sustained_limit,
            blacklist: self.admission.blacklist.clone(),
            guard,
            ..Default::default()
        };
        Ok(AdmissionControl::new(config)?)
    }

    /// Build the topology policy from the `[topology]` section.
    #[must_use]
    pub fn topology(&self) -> TopologyConfig {
        TopologyConfig {
            hidden_addresses: self.topology.hidden_addresses.clone(),
            test_marker: self.topology.test_marker.clone(),
        }
    }
}

/// UDP intake configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UdpConfig {
    /// Socket address to bind the telemetry listener on.
    pub bind: String,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:14236".to_string(),
        }
    }
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionSection {
    /// Sustained datagrams-per-second limit per source. Zero disables the
    /// rolling-window limiter.
    pub sustained_limit: u32,
    /// CIDR prefixes (or bare addresses) refused outright.
    pub blacklist: Vec<String>,
    pub packet_guard: PacketGuardSection,
}

impl Default for AdmissionSection {
    fn default() -> Self {
        Self {
            sustained_limit: AdmissionConfig::default().sustained_limit,
            blacklist: Vec::new(),
            packet_guard: PacketGuardSection::default(),
        }
    }
}

/// Token-bucket packet guard configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacketGuardSection {
    pub enabled: bool,
    pub packets_per_second: u32,
    pub global_multiplier: u32,
}

impl Default for PacketGuardSection {
    fn default() -> Self {
        let defaults = PacketGuardConfig::default();
        Self {
            enabled: true,
            packets_per_second: defaults.packets_per_second,
            global_multiplier: defaults.global_multiplier,
        }
    }
}

/// Topology visibility configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologySection {
    /// Base identifiers excluded from base queries.
    pub hidden_addresses: Vec<String>,
    /// Base identifier reserved for test stations.
    pub test_marker: String,
}

impl Default for TopologySection {
    fn default() -> Self {
        let defaults = TopologyConfig::default();
        Self {
            hidden_addresses: defaults.hidden_addresses,
            test_marker: defaults.test_marker,
        }
    }
}

/// Persistence flush configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceSection {
    /// Seconds between dirty-set flushes.
    pub flush_secs: u64,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self { flush_secs: 30 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let config = NodeConfig::default();
        assert_eq!(config.udp.bind, "0.0.0.0:14236");
        assert_eq!(config.admission.sustained_limit, 10);
        assert!(config.admission.packet_guard.enabled);
        assert_eq!(config.topology.test_marker, "TEST");
        assert_eq!(config.persistence.flush_secs, 30);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let raw = r#"
            [admission]
            sustained_limit = 25
            blacklist = ["10.0.0.0/8"]
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.admission.sustained_limit, 25);
        assert_eq!(config.admission.blacklist, vec!["10.0.0.0/8"]);
        assert_eq!(config.udp.bind, "0.0.0.0:14236");
        assert!(config.admission.packet_guard.enabled);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let raw = r#"
            [admission]
            sustained_limi = 25
        "#;
        assert!(toml::from_str::<NodeConfig>(raw).is_err());
    }

    #[test]
    fn test_no_policy_at_all_is_fatal() {
        let raw = r#"
            [admission]
            sustained_limit = 0

            [admission.packet_guard]
            enabled = false
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert!(config.admission().is_err());
    }

    #[test]
    fn test_malformed_blacklist_entry_is_not_fatal() {
        let raw = r#"
            [admission]
            blacklist = ["10.0.0.0/999", "192.168.1.0/24"]
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert!(config.admission().is_ok());
    }

    #[test]
    fn test_guard_section_maps_through() {
        let raw = r#"
            [admission.packet_guard]
            enabled = true
            packets_per_second = 5
            global_multiplier = 10
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.admission.packet_guard.packets_per_second, 5);
        assert_eq!(config.admission.packet_guard.global_multiplier, 10);
    }
}

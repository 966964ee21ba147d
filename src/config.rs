// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Configuration file types and parsing for the upstream core.
//!
//! JSON5 configuration format supporting:
//! - Protocol timer intervals with RFC 4601 defaults
//! - Per-interface timing overrides
//! - Static RP mappings
//! - Comments and trailing commas

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::collab::RpMap;
use crate::SourceGroup;

fn default_t_periodic_secs() -> u64 {
    60
}

fn default_keepalive_secs() -> u64 {
    210
}

fn default_register_suppress_secs() -> u64 {
    60
}

fn default_register_probe_secs() -> u64 {
    5
}

fn default_msdp_reg_secs() -> u64 {
    180
}

fn default_wheel_period_ms() -> u64 {
    31_000
}

fn default_wheel_slots() -> usize {
    100
}

fn default_stream_idle_secs() -> u64 {
    30
}

fn default_t_override_ms() -> u64 {
    2_500
}

fn default_register_interface() -> String {
    "pimreg".to_string()
}

/// Per-interface timing overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InterfaceTiming {
    /// Join override interval in milliseconds
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t_override_ms: Option<u64>,

    /// Join suppression bound in milliseconds
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t_suppressed_ms: Option<u64>,
}

/// Startup/running configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PimConfig {
    /// Periodic Join/Prune retransmission interval, seconds
    #[serde(default = "default_t_periodic_secs")]
    pub t_periodic_secs: u64,

    /// (S,G) keepalive period, seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_period_secs: u64,

    /// Register suppression period, seconds
    #[serde(default = "default_register_suppress_secs")]
    pub register_suppress_secs: u64,

    /// Null-register probe period, seconds
    #[serde(default = "default_register_probe_secs")]
    pub register_probe_secs: u64,

    /// MSDP source-active registration period, seconds
    #[serde(default = "default_msdp_reg_secs")]
    pub msdp_reg_period_secs: u64,

    /// Full rotation period of the activity wheel, milliseconds
    #[serde(default = "default_wheel_period_ms")]
    pub wheel_period_ms: u64,

    /// Number of activity wheel buckets
    #[serde(default = "default_wheel_slots")]
    pub wheel_slots: usize,

    /// Idle threshold beyond which a flow no longer refreshes its
    /// keepalive, seconds
    #[serde(default = "default_stream_idle_secs")]
    pub stream_idle_secs: u64,

    /// Default Join override interval, milliseconds
    #[serde(default = "default_t_override_ms")]
    pub t_override_ms: u64,

    /// Per-interface timing overrides
    #[serde(default)]
    pub interfaces: HashMap<String, InterfaceTiming>,

    /// Name of the register encapsulation interface
    #[serde(default = "default_register_interface")]
    pub register_interface: String,

    /// Static RP mappings (group prefix -> RP address)
    #[serde(default)]
    pub static_rp: HashMap<Ipv4Addr, Ipv4Addr>,

    /// Our RP address (if we are an RP)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rp_address: Option<Ipv4Addr>,
}

impl Default for PimConfig {
    fn default() -> Self {
        Self {
            t_periodic_secs: default_t_periodic_secs(),
            keepalive_period_secs: default_keepalive_secs(),
            register_suppress_secs: default_register_suppress_secs(),
            register_probe_secs: default_register_probe_secs(),
            msdp_reg_period_secs: default_msdp_reg_secs(),
            wheel_period_ms: default_wheel_period_ms(),
            wheel_slots: default_wheel_slots(),
            stream_idle_secs: default_stream_idle_secs(),
            t_override_ms: default_t_override_ms(),
            interfaces: HashMap::new(),
            register_interface: default_register_interface(),
            static_rp: HashMap::new(),
            rp_address: None,
        }
    }
}

impl PimConfig {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to JSON5 string (with pretty formatting)
    pub fn to_json5(&self) -> String {
        // json5 crate doesn't have pretty printing, so we use serde_json for
        // output and rely on json5 for input (which handles comments and
        // trailing commas)
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5();
        std::fs::write(path, content)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("t_periodic_secs", self.t_periodic_secs),
            ("keepalive_period_secs", self.keepalive_period_secs),
            ("register_suppress_secs", self.register_suppress_secs),
            ("register_probe_secs", self.register_probe_secs),
            ("msdp_reg_period_secs", self.msdp_reg_period_secs),
            ("wheel_period_ms", self.wheel_period_ms),
            ("t_override_ms", self.t_override_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTimer {
                    name: name.to_string(),
                    reason: "must be non-zero".to_string(),
                });
            }
        }

        if self.wheel_slots == 0 {
            return Err(ConfigError::InvalidTimer {
                name: "wheel_slots".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        // The probe must fit twice into the suppression period or the
        // randomized register-stop interval can go negative (RFC 4601 4.4.1)
        if self.register_probe_secs * 2 > self.register_suppress_secs {
            return Err(ConfigError::InvalidTimer {
                name: "register_probe_secs".to_string(),
                reason: format!(
                    "must be at most half of register_suppress_secs ({})",
                    self.register_suppress_secs
                ),
            });
        }

        for group in self.static_rp.keys() {
            if !group.is_multicast() {
                return Err(ConfigError::InvalidGroupAddress { address: *group });
            }
        }

        Ok(())
    }

    /// Periodic Join/Prune interval
    pub fn t_periodic(&self) -> Duration {
        Duration::from_secs(self.t_periodic_secs)
    }

    /// Keepalive period
    pub fn keepalive_period(&self) -> Duration {
        Duration::from_secs(self.keepalive_period_secs)
    }

    /// Register suppression period
    pub fn register_suppress(&self) -> Duration {
        Duration::from_secs(self.register_suppress_secs)
    }

    /// Null-register probe period
    pub fn register_probe(&self) -> Duration {
        Duration::from_secs(self.register_probe_secs)
    }

    /// MSDP source-active registration period
    pub fn msdp_reg_period(&self) -> Duration {
        Duration::from_secs(self.msdp_reg_period_secs)
    }

    /// Activity wheel rotation period
    pub fn wheel_period(&self) -> Duration {
        Duration::from_millis(self.wheel_period_ms)
    }

    /// Idle threshold for flow activity
    pub fn stream_idle_threshold(&self) -> Duration {
        Duration::from_secs(self.stream_idle_secs)
    }

    /// Join override interval for `interface`
    pub fn t_override(&self, interface: &str) -> Duration {
        let ms = self
            .interfaces
            .get(interface)
            .and_then(|t| t.t_override_ms)
            .unwrap_or(self.t_override_ms);
        Duration::from_millis(ms)
    }

    /// Join suppression bound for `interface` (1.25 x t_periodic unless
    /// overridden)
    pub fn t_suppressed(&self, interface: &str) -> Duration {
        let default_ms = self.t_periodic_secs * 1_250;
        let ms = self
            .interfaces
            .get(interface)
            .and_then(|t| t.t_suppressed_ms)
            .unwrap_or(default_ms);
        Duration::from_millis(ms)
    }

    /// Get the RP for a group (from static configuration)
    pub fn rp_for_group(&self, group: Ipv4Addr) -> Option<Ipv4Addr> {
        // Simple longest-prefix match on group address
        // In practice, this would use a proper prefix trie
        self.static_rp
            .iter()
            .filter(|(prefix, _)| {
                **prefix == group || group.octets()[0] == prefix.octets()[0] // Same first octet
            })
            .map(|(_, rp)| *rp)
            .next()
    }

    /// Check if we are the RP for this group
    pub fn is_rp_for_group(&self, group: Ipv4Addr) -> bool {
        if let Some(our_rp) = self.rp_address {
            self.rp_for_group(group) == Some(our_rp)
        } else {
            false
        }
    }
}

/// RP-mapping collaborator backed by the static configuration table
#[derive(Debug, Clone, Default)]
pub struct StaticRpMap {
    static_rp: HashMap<Ipv4Addr, Ipv4Addr>,
    rp_address: Option<Ipv4Addr>,
}

impl StaticRpMap {
    /// Build from a parsed configuration
    pub fn from_config(config: &PimConfig) -> Self {
        Self {
            static_rp: config.static_rp.clone(),
            rp_address: config.rp_address,
        }
    }
}

impl RpMap for StaticRpMap {
    fn rp_for_group(&self, group: Ipv4Addr) -> Option<Ipv4Addr> {
        self.static_rp
            .iter()
            .filter(|(prefix, _)| **prefix == group || group.octets()[0] == prefix.octets()[0])
            .map(|(_, rp)| *rp)
            .next()
    }

    fn i_am_rp(&self, group: Ipv4Addr) -> bool {
        match self.rp_address {
            Some(our_rp) => self.rp_for_group(group) == Some(our_rp),
            None => false,
        }
    }

    fn clear_source_cache(&mut self, _sg: SourceGroup) {
        // Static mapping carries no active-source cache
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::path::PathBuf, String),
    ParseError(String),
    InvalidTimer { name: String, reason: String },
    InvalidGroupAddress { address: Ipv4Addr },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    msg
                )
            }
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::InvalidTimer { name, reason } => {
                write!(f, "invalid timer '{}': {}", name, reason)
            }
            ConfigError::InvalidGroupAddress { address } => {
                write!(f, "static RP key '{}' is not a multicast address", address)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging facilities (component identifiers)

use serde::{Deserialize, Serialize};

/// Logging facility - identifies which component generated the log message
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    /// Entry repository, reference counting, tree linkage
    Upstream = 0,
    /// Join/Prune state machine and join timer handling
    JoinPrune = 1,
    /// First-hop-router Register state machine
    Register = 2,
    /// Activity timer wheel and keepalive handling
    Wheel = 3,
    /// RPF resolution and re-evaluation
    Rpf = 4,
    /// MSDP source-active notifications
    Msdp = 5,
    /// Configuration loading and validation
    Config = 6,

    /// Test harness and fixtures
    Test = 7,

    /// Fallback for uncategorized messages
    Unknown = 255,
}

impl Facility {
    /// Get facility code as u8
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get facility name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Upstream => "Upstream",
            Facility::JoinPrune => "JoinPrune",
            Facility::Register => "Register",
            Facility::Wheel => "Wheel",
            Facility::Rpf => "Rpf",
            Facility::Msdp => "Msdp",
            Facility::Config => "Config",
            Facility::Test => "Test",
            Facility::Unknown => "Unknown",
        }
    }

    /// Create from u8 value (returns Unknown if invalid)
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Facility::Upstream,
            1 => Facility::JoinPrune,
            2 => Facility::Register,
            3 => Facility::Wheel,
            4 => Facility::Rpf,
            5 => Facility::Msdp,
            6 => Facility::Config,
            7 => Facility::Test,
            _ => Facility::Unknown,
        }
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

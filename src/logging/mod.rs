// SPDX-License-Identifier: Apache-2.0 OR MIT
// Facility/severity logging for the upstream core
//
// Log call sites mirror the protocol state machines: entry lifecycle,
// state transitions, timer arming and suppression decisions. Output goes
// through a pluggable sink so tests can capture entries in memory.

mod facility;
mod logger;
#[macro_use]
mod macros;
mod severity;

// Public exports
pub use facility::Facility;
pub use logger::{LogEntry, LogSink, Logger, MemorySink, StderrJsonSink};
pub use severity::Severity;

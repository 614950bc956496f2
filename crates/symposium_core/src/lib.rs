//! SYMPOSIUM Core Types
//!
//! This crate contains pure types and logic with no I/O: identifiers for
//! seats and forks, the philosopher phase machine, the immutable ring
//! topology, and the error taxonomy shared by the other crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod phase;
pub mod topology;

// Re-exports
pub use error::{CoreError, CoreResult, ProtocolViolation};
pub use id::{ForkId, PhilosopherId, RunId};
pub use phase::Phase;
pub use topology::{MIN_SEATS, Topology, Wiring};

//! Stateful managers for the AXTerm runtime
//!
//! Manager structs own shared mutable state and serialize access to it.

pub mod transmission;

pub use transmission::{TransmissionStatistics, TransmissionTracker};

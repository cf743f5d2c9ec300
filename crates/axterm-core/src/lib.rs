//! AXTerm Link Reliability Core
//!
//! This crate provides the pure, synchronous mechanisms that sit between
//! application-level outbound requests and a shared half-duplex packet-radio
//! channel:
//! - `rate_limiter`: per-destination token buckets and their registry
//! - `protocol::transmission`: the lifecycle of a queued outbound unit
//! - `protocol::sequencer`: deterministic ordering of received items
//!
//! Every operation takes the current time as an explicit argument. Nothing in
//! this crate reads a clock, sleeps, or performs I/O. It is `no_std + alloc`
//! compatible when the `std` feature is disabled.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod protocol;
pub mod rate_limiter;
pub mod retry;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{RateLimitConfig, SequencerConfig};
pub use errors::{AxtermError, AxtermResult, ProgressError, Result, TransitionError};
pub use protocol::{
    arrival_order, can_transition, insert, insertion_index, precedes, ArrivalSequencer,
    Sequenced, TransitionRecord, TransmissionMode, TransmissionState, TransmissionUnit,
};
pub use rate_limiter::{BucketRegistry, PacingStats, TokenBucket};
pub use retry::RetryScheduler;
pub use types::{DestinationId, SessionKey, TimeSource, Timestamp, UnitId};

#[cfg(feature = "std")]
pub use types::SystemTimeSource;

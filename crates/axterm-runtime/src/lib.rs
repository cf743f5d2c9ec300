//! AXTerm Runtime
//!
//! This crate wraps the synchronous `axterm-core` mechanisms for use from
//! many threads and tokio tasks at once:
//! - `LinkEngine`: admission plus lifecycle tracking for outbound units
//! - `SharedBucketRegistry`: per-destination pacing behind a sharded map
//! - `TransmissionTracker`: one writer per unit, snapshot reads
//! - `SharedSequencer`: arrival ordering with atomic inserts
//! - `ChannelRetryScheduler`: tokio-timer retry delivery
//!
//! Configuration is loaded with figment and logging goes through `tracing`.

pub mod builder;
pub mod config;
pub mod engine;
pub mod logging;
pub mod managers;
pub mod pacing;
pub mod scheduler;
pub mod sequencer;

pub use builder::LinkEngineBuilder;
pub use config::{ConfigError, LoggingConfig, RuntimeConfig};
pub use engine::{LinkEngine, SendDecision, SharedRetryScheduler};
pub use logging::init_tracing;
pub use managers::*;
pub use pacing::SharedBucketRegistry;
pub use scheduler::{ChannelRetryScheduler, RetryDue, RetryReceiver};
pub use sequencer::SharedSequencer;

// Re-export core types for convenience
pub use axterm_core::{
    AxtermError, AxtermResult, DestinationId, RateLimitConfig, RetryScheduler, Sequenced,
    SequencerConfig, SessionKey, Timestamp, TransitionRecord, TransmissionMode,
    TransmissionState, TransmissionUnit, UnitId,
};

//! Test utilities for deterministic testing of the reliability core
//!
//! Every core operation takes `now` explicitly; this mock clock is how tests
//! produce those timestamps without real waits.

#![allow(dead_code)]

use axterm_core::types::{TimeSource, Timestamp};
use axterm_core::{DestinationId, SessionKey, TransmissionMode, TransmissionUnit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Mock Time Source
// ----------------------------------------------------------------------------

/// Mock time source for deterministic testing
#[derive(Debug, Clone)]
pub struct MockTimeSource {
    current_time: Arc<AtomicU64>,
}

impl MockTimeSource {
    /// Create a new mock time source starting at time 0
    pub fn new() -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance time by the specified number of milliseconds
    pub fn advance(&self, millis: u64) {
        self.current_time.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the time to a specific value
    pub fn set_time(&self, millis: u64) {
        self.current_time.store(millis, Ordering::SeqCst);
    }
}

impl Default for MockTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current_time.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

pub fn create_test_destination(id: u8) -> DestinationId {
    DestinationId::new(format!("N0CALL-{}", id))
}

pub fn create_test_unit(bytes_total: u64, now: Timestamp) -> TransmissionUnit {
    TransmissionUnit::new(
        SessionKey::new("test-session"),
        create_test_destination(1),
        TransmissionMode::Unit,
        bytes_total,
        now,
    )
}

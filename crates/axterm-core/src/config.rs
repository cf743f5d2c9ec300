//! Centralized Configuration
//!
//! Configuration structures for the reliability core. Defaults are sized for
//! a 1200 baud AFSK VHF channel, where roughly 150 payload bytes per second
//! is the ceiling before the channel is saturated.

use serde::{Deserialize, Serialize};

use crate::errors::{AxtermError, Result};

// ----------------------------------------------------------------------------
// Rate Limiting Configuration
// ----------------------------------------------------------------------------

/// Token bucket parameters applied to every destination's bucket
///
/// Costs are expressed in payload bytes, so `rate_per_second` is a sustained
/// byte rate and `capacity` is the largest burst a destination may send.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens added per elapsed second
    pub rate_per_second: f64,
    /// Maximum tokens a bucket can hold
    pub capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::vhf_1200()
    }
}

impl RateLimitConfig {
    pub fn new(rate_per_second: f64, capacity: f64) -> Self {
        Self {
            rate_per_second,
            capacity,
        }
    }

    /// 1200 baud AFSK: 150 bytes/s sustained, 2 KiB burst
    pub fn vhf_1200() -> Self {
        Self {
            rate_per_second: 150.0,
            capacity: 2048.0,
        }
    }

    /// 9600 baud G3RUH: 1200 bytes/s sustained, 8 KiB burst
    pub fn uhf_9600() -> Self {
        Self {
            rate_per_second: 1200.0,
            capacity: 8192.0,
        }
    }

    /// Create a permissive config for testing
    pub fn permissive() -> Self {
        Self {
            rate_per_second: 1_000_000.0,
            capacity: 1_000_000.0,
        }
    }

    /// Reject non-finite or non-positive parameters
    pub fn validate(&self) -> Result<()> {
        if !self.rate_per_second.is_finite() || self.rate_per_second <= 0.0 {
            return Err(AxtermError::config_error(
                "rate_per_second must be a positive finite number",
            ));
        }
        if !self.capacity.is_finite() || self.capacity <= 0.0 {
            return Err(AxtermError::config_error(
                "capacity must be a positive finite number",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Sequencer Configuration
// ----------------------------------------------------------------------------

/// Retention settings for the arrival sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Keep at most this many items, dropping the oldest first (`None` = unbounded)
    pub max_items: Option<usize>,
}

impl SequencerConfig {
    pub fn bounded(max_items: usize) -> Self {
        Self {
            max_items: Some(max_items),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_items == Some(0) {
            return Err(AxtermError::config_error(
                "max_items must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Core types for the AXTerm link layer
//!
//! This module defines the fundamental types used throughout the reliability
//! core, using newtype patterns for semantic validation and type safety.

use core::fmt;
use core::ops::{Add, Sub};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

cfg_if::cfg_if! {
    if #[cfg(not(feature = "std"))] {
        use alloc::string::String;
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp from a monotonic source
///
/// The epoch is whatever the injected [`TimeSource`] uses. Only differences
/// between timestamps from the same source are meaningful.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, millis: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(millis))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    /// Sub-millisecond remainders round up to the next tick
    fn add(self, duration: Duration) -> Timestamp {
        let millis = u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// The zero timestamp
    pub const ZERO: Self = Self(0);

    /// Create a new timestamp
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Create a timestamp from whole seconds
    pub const fn from_secs(seconds: u64) -> Self {
        Self(seconds.saturating_mul(1000))
    }

    /// Get current wall-clock timestamp
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Get duration since another timestamp, zero if `other` is later
    pub fn duration_since(&self, other: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }

    /// Fractional seconds elapsed since `earlier`, clamped at zero
    pub fn seconds_since(&self, earlier: Self) -> f64 {
        self.0.saturating_sub(earlier.0) as f64 / 1000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Trait for providing timestamps in a no_std compatible way
///
/// The core never calls this itself; it is the seam through which callers
/// obtain the `now` they pass to every operation.
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Monotonic time source anchored at construction
        #[derive(Debug, Clone, Copy)]
        pub struct SystemTimeSource {
            origin: std::time::Instant,
        }

        impl SystemTimeSource {
            pub fn new() -> Self {
                Self { origin: std::time::Instant::now() }
            }
        }

        impl Default for SystemTimeSource {
            fn default() -> Self {
                Self::new()
            }
        }

        impl TimeSource for SystemTimeSource {
            fn now(&self) -> Timestamp {
                Timestamp(self.origin.elapsed().as_millis() as u64)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Destination Identifier
// ----------------------------------------------------------------------------

/// Remote station a unit is sent to (callsign with optional SSID)
///
/// Identifiers arrive already normalized; this type does not inspect them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(callsign: impl Into<String>) -> Self {
        Self(callsign.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(callsign: &str) -> Self {
        Self(callsign.into())
    }
}

impl From<String> for DestinationId {
    fn from(callsign: String) -> Self {
        Self(callsign)
    }
}

// ----------------------------------------------------------------------------
// Transmission Unit Identifier
// ----------------------------------------------------------------------------

/// Opaque unique identifier of one outbound transmission unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(Uuid);

impl UnitId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Session Key
// ----------------------------------------------------------------------------

/// Correlation handle tying a unit to a higher-level exchange
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_since_clamps_backwards_time() {
        let earlier = Timestamp::new(1_500);
        let later = Timestamp::new(2_000);

        assert_eq!(later.seconds_since(earlier), 0.5);
        assert_eq!(earlier.seconds_since(later), 0.0);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_secs(2);
        assert_eq!(t.as_millis(), 2_000);
        assert_eq!((t + 250).as_millis(), 2_250);
        assert_eq!((t + Duration::from_millis(10)).as_millis(), 2_010);
        assert_eq!(Timestamp::new(5) - Timestamp::new(9), 0);
    }

    #[test]
    fn test_adding_duration_rounds_up() {
        let t = Timestamp::new(100);
        assert_eq!((t + Duration::from_nanos(333_333_333)).as_millis(), 434);
        assert_eq!((t + Duration::from_nanos(1)).as_millis(), 101);
        assert_eq!((t + Duration::ZERO).as_millis(), 100);
        assert_eq!((t + Duration::MAX).as_millis(), u64::MAX);
    }

    #[test]
    fn test_destination_is_opaque() {
        let dest = DestinationId::new("n0call-7");
        assert_eq!(dest.as_str(), "n0call-7");
        assert_ne!(dest, DestinationId::from("N0CALL-7"));
    }

    #[test]
    fn test_unit_ids_are_unique() {
        assert_ne!(UnitId::new(), UnitId::new());
    }
}

//! Error types for the AXTerm reliability core
//!
//! Admission denial is not an error: the registry answers with a boolean and
//! the caller consults `time_until_available`. Everything here is a contract
//! violation reported synchronously to the immediate caller. None of these
//! conditions is retried internally.

use alloc::string::String;
#[cfg(not(feature = "std"))]
use core::fmt;

use crate::protocol::TransmissionState;
use crate::types::UnitId;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Rejected lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum TransitionError {
    #[cfg_attr(
        feature = "std",
        error("Illegal transition for unit {unit_id}: {from} -> {to}")
    )]
    Illegal {
        unit_id: UnitId,
        from: TransmissionState,
        to: TransmissionState,
    },
    #[cfg_attr(
        feature = "std",
        error("Unit {unit_id} cannot be marked sent: {acked}/{total} bytes acknowledged")
    )]
    IncompleteAcknowledgment {
        unit_id: UnitId,
        acked: u64,
        total: u64,
    },
}

/// Rejected acknowledged-byte progress updates
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ProgressError {
    #[cfg_attr(
        feature = "std",
        error("Unit {unit_id}: {proposed} acknowledged bytes exceeds total of {total}")
    )]
    ExceedsTotal {
        unit_id: UnitId,
        proposed: u64,
        total: u64,
    },
    #[cfg_attr(
        feature = "std",
        error("Unit {unit_id}: acknowledged bytes cannot regress from {current} to {proposed}")
    )]
    Regression {
        unit_id: UnitId,
        current: u64,
        proposed: u64,
    },
    #[cfg_attr(
        feature = "std",
        error("Unit {unit_id} is {state}; progress is frozen")
    )]
    Terminal {
        unit_id: UnitId,
        state: TransmissionState,
    },
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Core error type for the AXTerm reliability layer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum AxtermError {
    #[cfg_attr(feature = "std", error("State transition error: {0}"))]
    Transition(#[cfg_attr(feature = "std", from)] TransitionError),

    #[cfg_attr(feature = "std", error("Progress error: {0}"))]
    Progress(#[cfg_attr(feature = "std", from)] ProgressError),

    #[cfg_attr(feature = "std", error("Unknown transmission unit: {unit_id}"))]
    UnknownUnit { unit_id: UnitId },

    #[cfg_attr(
        feature = "std",
        error("Unit {unit_id} is still {state} and cannot be archived")
    )]
    NotTerminal {
        unit_id: UnitId,
        state: TransmissionState,
    },

    #[cfg_attr(
        feature = "std",
        error("Restored unit {unit_id} is inconsistent: {reason}")
    )]
    InvalidUnit {
        unit_id: UnitId,
        reason: &'static str,
    },

    #[cfg_attr(feature = "std", error("Configuration error: {reason}"))]
    Configuration { reason: String },
}

cfg_if::cfg_if! {
    if #[cfg(not(feature = "std"))] {
        impl From<TransitionError> for AxtermError {
            fn from(err: TransitionError) -> Self {
                AxtermError::Transition(err)
            }
        }

        impl From<ProgressError> for AxtermError {
            fn from(err: ProgressError) -> Self {
                AxtermError::Progress(err)
            }
        }

        impl fmt::Display for TransitionError {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    TransitionError::Illegal { unit_id, from, to } => {
                        write!(f, "Illegal transition for unit {}: {} -> {}", unit_id, from, to)
                    }
                    TransitionError::IncompleteAcknowledgment { unit_id, acked, total } => write!(
                        f,
                        "Unit {} cannot be marked sent: {}/{} bytes acknowledged",
                        unit_id, acked, total
                    ),
                }
            }
        }

        impl fmt::Display for ProgressError {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    ProgressError::ExceedsTotal { unit_id, proposed, total } => write!(
                        f,
                        "Unit {}: {} acknowledged bytes exceeds total of {}",
                        unit_id, proposed, total
                    ),
                    ProgressError::Regression { unit_id, current, proposed } => write!(
                        f,
                        "Unit {}: acknowledged bytes cannot regress from {} to {}",
                        unit_id, current, proposed
                    ),
                    ProgressError::Terminal { unit_id, state } => {
                        write!(f, "Unit {} is {}; progress is frozen", unit_id, state)
                    }
                }
            }
        }

        impl fmt::Display for AxtermError {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    AxtermError::Transition(err) => write!(f, "State transition error: {}", err),
                    AxtermError::Progress(err) => write!(f, "Progress error: {}", err),
                    AxtermError::UnknownUnit { unit_id } => {
                        write!(f, "Unknown transmission unit: {}", unit_id)
                    }
                    AxtermError::NotTerminal { unit_id, state } => write!(
                        f,
                        "Unit {} is still {} and cannot be archived",
                        unit_id, state
                    ),
                    AxtermError::InvalidUnit { unit_id, reason } => {
                        write!(f, "Restored unit {} is inconsistent: {}", unit_id, reason)
                    }
                    AxtermError::Configuration { reason } => {
                        write!(f, "Configuration error: {}", reason)
                    }
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl AxtermError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        AxtermError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an unknown unit error
    pub fn unknown_unit(unit_id: UnitId) -> Self {
        AxtermError::UnknownUnit { unit_id }
    }

    /// Whether the caller should give up on the affected unit
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AxtermError::Transition(_) | AxtermError::Progress(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, AxtermError>;
pub type AxtermResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

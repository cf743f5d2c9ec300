//! Transmission Unit Lifecycle
//!
//! Each queued outbound payload carries a small state machine:
//!
//! ```text
//! queued ──► sending ──► sent
//!   │          │  ▲
//!   │          ▼  │
//!   │       retrying
//!   │          │
//!   └────► failed ◄──┘ (also from sending)
//! ```
//!
//! `sent` and `failed` are terminal. Legality is a pure predicate
//! ([`can_transition`]); [`TransmissionUnit::apply`] is the only mutator of
//! state and re-checks legality before touching anything. The lifecycle keeps
//! no retry timing: it records that an attempt happened, and the caller
//! decides when the next one should.

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::{AxtermError, ProgressError, TransitionError};
use crate::types::{DestinationId, SessionKey, Timestamp, UnitId};

// ----------------------------------------------------------------------------
// Transmission State
// ----------------------------------------------------------------------------

/// Lifecycle state of an outbound unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionState {
    /// Submitted, waiting for admission
    Queued,
    /// Handed to the link layer, awaiting acknowledgment
    Sending,
    /// Fully acknowledged by the destination
    Sent,
    /// Last attempt failed; another attempt is expected
    Retrying,
    /// Given up or cancelled
    Failed,
}

impl TransmissionState {
    pub const ALL: [TransmissionState; 5] = [
        TransmissionState::Queued,
        TransmissionState::Sending,
        TransmissionState::Sent,
        TransmissionState::Retrying,
        TransmissionState::Failed,
    ];

    /// Get current state name for logging/audit
    pub fn name(&self) -> &'static str {
        match self {
            TransmissionState::Queued => "queued",
            TransmissionState::Sending => "sending",
            TransmissionState::Sent => "sent",
            TransmissionState::Retrying => "retrying",
            TransmissionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransmissionState::Sent | TransmissionState::Failed)
    }

    pub fn can_transition_to(self, next: TransmissionState) -> bool {
        can_transition(self, next)
    }
}

impl fmt::Display for TransmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `from -> to` is a legal lifecycle transition
pub const fn can_transition(from: TransmissionState, to: TransmissionState) -> bool {
    use TransmissionState::*;
    matches!(
        (from, to),
        (Queued, Sending)
            | (Queued, Failed)
            | (Sending, Sent)
            | (Sending, Retrying)
            | (Sending, Failed)
            | (Retrying, Sending)
            | (Retrying, Failed)
    )
}

// ----------------------------------------------------------------------------
// Transmission Mode
// ----------------------------------------------------------------------------

/// How the link layer segments the payload; carried as metadata only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    /// Sent as a single frame
    #[default]
    Unit,
    /// Split into several frames acknowledged incrementally
    Chunked,
}

// ----------------------------------------------------------------------------
// Transition Record
// ----------------------------------------------------------------------------

/// Audit trail entry for an applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub unit_id: UnitId,
    pub from: TransmissionState,
    pub to: TransmissionState,
    pub at: Timestamp,
    /// Attempt count after the transition
    pub attempt: u32,
    pub reason: Option<String>,
}

// ----------------------------------------------------------------------------
// Transmission Unit
// ----------------------------------------------------------------------------

/// One outbound payload tracked through send, acknowledgment and retry
///
/// Deserialization re-checks the lifecycle invariants, so a unit restored by
/// the persistence layer is as consistent as one built through `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UnitRecord")]
pub struct TransmissionUnit {
    id: UnitId,
    session_key: SessionKey,
    destination: DestinationId,
    mode: TransmissionMode,
    bytes_total: u64,
    bytes_acked: u64,
    state: TransmissionState,
    attempt_count: u32,
    last_error: Option<String>,
    created_at: Timestamp,
    sent_at: Option<Timestamp>,
    acked_at: Option<Timestamp>,
}

impl TransmissionUnit {
    /// Create a queued unit with a fresh identifier
    pub fn new(
        session_key: SessionKey,
        destination: DestinationId,
        mode: TransmissionMode,
        bytes_total: u64,
        now: Timestamp,
    ) -> Self {
        Self::with_id(UnitId::new(), session_key, destination, mode, bytes_total, now)
    }

    /// Create a queued unit with a caller-chosen identifier
    pub fn with_id(
        id: UnitId,
        session_key: SessionKey,
        destination: DestinationId,
        mode: TransmissionMode,
        bytes_total: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            session_key,
            destination,
            mode,
            bytes_total,
            bytes_acked: 0,
            state: TransmissionState::Queued,
            attempt_count: 0,
            last_error: None,
            created_at: now,
            sent_at: None,
            acked_at: None,
        }
    }

    /// Whether this unit may move to `proposed` right now
    pub fn can_transition(&self, proposed: TransmissionState) -> bool {
        can_transition(self.state, proposed)
    }

    /// Apply a legal transition
    ///
    /// `reason` becomes `last_error` on transitions into `retrying` or
    /// `failed`; on other transitions it is only recorded in the returned
    /// audit entry. A missing reason leaves `last_error` untouched.
    ///
    /// Moving to `sent` requires every byte to be acknowledged. Nothing is
    /// modified when an error is returned.
    pub fn apply(
        &mut self,
        proposed: TransmissionState,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<TransitionRecord, TransitionError> {
        let from = self.state;
        if !can_transition(from, proposed) {
            return Err(TransitionError::Illegal {
                unit_id: self.id,
                from,
                to: proposed,
            });
        }
        if proposed == TransmissionState::Sent && self.bytes_acked != self.bytes_total {
            return Err(TransitionError::IncompleteAcknowledgment {
                unit_id: self.id,
                acked: self.bytes_acked,
                total: self.bytes_total,
            });
        }

        // created_at <= sent_at <= acked_at even if the caller's clock stepped back
        let now = now.max(self.sent_at.unwrap_or(self.created_at));

        match proposed {
            TransmissionState::Sending => {
                self.attempt_count = self.attempt_count.saturating_add(1);
                if self.sent_at.is_none() {
                    self.sent_at = Some(now);
                }
            }
            TransmissionState::Sent => {
                self.acked_at = Some(now);
            }
            TransmissionState::Retrying | TransmissionState::Failed => {
                if let Some(reason) = &reason {
                    self.last_error = Some(reason.clone());
                }
            }
            TransmissionState::Queued => {}
        }
        self.state = proposed;

        log::debug!(
            "unit {} {} -> {} (attempt {})",
            self.id,
            from,
            proposed,
            self.attempt_count
        );

        Ok(TransitionRecord {
            unit_id: self.id,
            from,
            to: proposed,
            at: now,
            attempt: self.attempt_count,
            reason,
        })
    }

    /// Set the cumulative acknowledged byte count
    ///
    /// The value may not decrease or exceed `bytes_total`. Re-reporting the
    /// current value is always accepted; any other change on a terminal unit
    /// is refused.
    pub fn record_progress(&mut self, bytes_acked: u64) -> Result<(), ProgressError> {
        if bytes_acked < self.bytes_acked {
            return Err(ProgressError::Regression {
                unit_id: self.id,
                current: self.bytes_acked,
                proposed: bytes_acked,
            });
        }
        if bytes_acked > self.bytes_total {
            return Err(ProgressError::ExceedsTotal {
                unit_id: self.id,
                proposed: bytes_acked,
                total: self.bytes_total,
            });
        }
        if bytes_acked == self.bytes_acked {
            return Ok(());
        }
        if self.state.is_terminal() {
            return Err(ProgressError::Terminal {
                unit_id: self.id,
                state: self.state,
            });
        }
        self.bytes_acked = bytes_acked;
        Ok(())
    }

    /// Add `delta` newly acknowledged bytes
    pub fn acknowledge_bytes(&mut self, delta: u64) -> Result<(), ProgressError> {
        self.record_progress(self.bytes_acked.saturating_add(delta))
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    pub fn destination(&self) -> &DestinationId {
        &self.destination
    }

    pub fn mode(&self) -> TransmissionMode {
        self.mode
    }

    pub fn state(&self) -> TransmissionState {
        self.state
    }

    pub fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    pub fn bytes_acked(&self) -> u64 {
        self.bytes_acked
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.bytes_total.saturating_sub(self.bytes_acked)
    }

    pub fn is_fully_acked(&self) -> bool {
        self.bytes_acked == self.bytes_total
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn sent_at(&self) -> Option<Timestamp> {
        self.sent_at
    }

    pub fn acked_at(&self) -> Option<Timestamp> {
        self.acked_at
    }
}

// ----------------------------------------------------------------------------
// Persisted Form
// ----------------------------------------------------------------------------

/// Unchecked field set read back from storage
#[derive(Deserialize)]
struct UnitRecord {
    id: UnitId,
    session_key: SessionKey,
    destination: DestinationId,
    mode: TransmissionMode,
    bytes_total: u64,
    bytes_acked: u64,
    state: TransmissionState,
    attempt_count: u32,
    last_error: Option<String>,
    created_at: Timestamp,
    sent_at: Option<Timestamp>,
    acked_at: Option<Timestamp>,
}

impl UnitRecord {
    fn inconsistency(&self) -> Option<&'static str> {
        use TransmissionState::*;

        if self.bytes_acked > self.bytes_total {
            return Some("acknowledged bytes exceed total");
        }
        if self.state == Sent && self.bytes_acked != self.bytes_total {
            return Some("sent without full acknowledgment");
        }
        if self.acked_at.is_some() != (self.state == Sent) {
            return Some("acknowledgment time present only when sent");
        }
        if self.sent_at.is_some() != (self.attempt_count > 0) {
            return Some("send time present only after an attempt");
        }
        if matches!(self.state, Sending | Sent | Retrying) && self.attempt_count == 0 {
            return Some("in-flight state without an attempt");
        }
        if self.state == Queued && self.attempt_count > 0 {
            return Some("queued unit with attempts");
        }
        if self.sent_at.is_some_and(|sent| sent < self.created_at) {
            return Some("sent before created");
        }
        if let (Some(sent), Some(acked)) = (self.sent_at, self.acked_at) {
            if acked < sent {
                return Some("acknowledged before sent");
            }
        }
        None
    }
}

impl TryFrom<UnitRecord> for TransmissionUnit {
    type Error = AxtermError;

    fn try_from(record: UnitRecord) -> Result<Self, Self::Error> {
        if let Some(reason) = record.inconsistency() {
            return Err(AxtermError::InvalidUnit {
                unit_id: record.id,
                reason,
            });
        }
        Ok(Self {
            id: record.id,
            session_key: record.session_key,
            destination: record.destination,
            mode: record.mode,
            bytes_total: record.bytes_total,
            bytes_acked: record.bytes_acked,
            state: record.state,
            attempt_count: record.attempt_count,
            last_error: record.last_error,
            created_at: record.created_at,
            sent_at: record.sent_at,
            acked_at: record.acked_at,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

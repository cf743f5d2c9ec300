//! Link engine
//!
//! Drives outbound units through admission and the lifecycle. A sender calls
//! [`LinkEngine::try_send`]; when the destination's bucket grants the unit's
//! size the unit moves to `sending` and the caller hands the bytes to the
//! link layer. The link layer's reports come back through the `report_*`
//! methods. Retry timing is chosen by the caller and carried out by the
//! injected [`RetryScheduler`].

use std::sync::Arc;
use std::time::Duration;

use axterm_core::{
    AxtermResult, DestinationId, RetryScheduler, SessionKey, Timestamp, TransmissionMode,
    TransmissionState, TransmissionUnit, UnitId,
};
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::managers::{TransmissionStatistics, TransmissionTracker};
use crate::pacing::SharedBucketRegistry;

/// Shared handle to a retry scheduler
pub type SharedRetryScheduler = Arc<dyn RetryScheduler + Send + Sync>;

// ----------------------------------------------------------------------------
// Send Decision
// ----------------------------------------------------------------------------

/// Outcome of an admission attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SendDecision {
    /// Tokens were spent and the unit is now `sending`
    Granted(TransmissionUnit),
    /// The destination is paced; try again no sooner than `retry_after`
    Deferred { retry_after: Duration },
}

impl SendDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, SendDecision::Granted(_))
    }
}

// ----------------------------------------------------------------------------
// Link Engine
// ----------------------------------------------------------------------------

/// Pacing and lifecycle tracking for every outbound unit
pub struct LinkEngine {
    config: RuntimeConfig,
    pacing: SharedBucketRegistry,
    tracker: TransmissionTracker,
    scheduler: SharedRetryScheduler,
}

impl LinkEngine {
    pub(crate) fn new(config: RuntimeConfig, scheduler: SharedRetryScheduler) -> Self {
        Self {
            pacing: SharedBucketRegistry::new(config.pacing),
            tracker: TransmissionTracker::new(),
            config,
            scheduler,
        }
    }

    /// Queue a unit for `destination`
    pub fn submit(
        &self,
        session_key: SessionKey,
        destination: DestinationId,
        mode: TransmissionMode,
        bytes_total: u64,
        now: Timestamp,
    ) -> TransmissionUnit {
        self.tracker
            .submit(session_key, destination, mode, bytes_total, now)
    }

    /// Ask for admission and, if granted, move the unit to `sending`
    ///
    /// The cost is the unit's full size. Tokens are only spent when the
    /// transition is legal, so calling this on a unit that is already
    /// sending or terminal returns the transition error and leaves the
    /// bucket alone.
    pub fn try_send(&self, unit_id: &UnitId, now: Timestamp) -> AxtermResult<SendDecision> {
        let outcome = self
            .tracker
            .apply_gated(unit_id, TransmissionState::Sending, now, |unit| {
                let destination = unit.destination();
                let cost = unit.bytes_total() as f64;
                if self.pacing.admit(destination, cost, now) {
                    return Ok(());
                }
                if cost > self.config.pacing.capacity {
                    warn!(
                        unit_id = %unit.id(),
                        destination = %destination,
                        cost,
                        capacity = self.config.pacing.capacity,
                        "unit larger than bucket capacity can never be admitted"
                    );
                }
                Err(self.pacing.time_until_available(destination, cost, now))
            })?;

        Ok(match outcome {
            Ok(unit) => {
                info!(
                    unit_id = %unit.id(),
                    destination = %unit.destination(),
                    attempt = unit.attempt_count(),
                    "unit admitted"
                );
                SendDecision::Granted(unit)
            }
            Err(retry_after) => {
                debug!(unit_id = %unit_id, ?retry_after, "unit deferred by pacing");
                SendDecision::Deferred { retry_after }
            }
        })
    }

    /// Record the cumulative acknowledged byte count from the link layer
    pub fn report_progress(
        &self,
        unit_id: &UnitId,
        bytes_acked: u64,
    ) -> AxtermResult<TransmissionUnit> {
        self.tracker.record_progress(unit_id, bytes_acked)
    }

    /// Mark a fully acknowledged unit as sent
    ///
    /// An incomplete acknowledgment is refused and the unit stays `sending`;
    /// the caller then reports a retry or a failure.
    pub fn report_delivered(
        &self,
        unit_id: &UnitId,
        now: Timestamp,
    ) -> AxtermResult<TransmissionUnit> {
        let unit = self
            .tracker
            .apply(unit_id, TransmissionState::Sent, None, now)?;
        info!(
            unit_id = %unit_id,
            attempts = unit.attempt_count(),
            "unit delivered"
        );
        Ok(unit)
    }

    /// Move a sending unit to `retrying` and schedule another attempt after `after`
    pub fn report_retry(
        &self,
        unit_id: &UnitId,
        reason: impl Into<String>,
        after: Duration,
        now: Timestamp,
    ) -> AxtermResult<TransmissionUnit> {
        let unit = self.tracker.apply(
            unit_id,
            TransmissionState::Retrying,
            Some(reason.into()),
            now,
        )?;
        self.scheduler.schedule_retry(&unit, after);
        Ok(unit)
    }

    /// Give up on a unit after a link-layer failure
    pub fn report_failure(
        &self,
        unit_id: &UnitId,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> AxtermResult<TransmissionUnit> {
        let unit = self.tracker.apply(
            unit_id,
            TransmissionState::Failed,
            Some(reason.into()),
            now,
        )?;
        warn!(
            unit_id = %unit_id,
            error = unit.last_error().unwrap_or(""),
            attempts = unit.attempt_count(),
            "unit failed"
        );
        Ok(unit)
    }

    /// Cancel a unit that has not been delivered
    pub fn cancel(
        &self,
        unit_id: &UnitId,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> AxtermResult<TransmissionUnit> {
        let unit = self.tracker.apply(
            unit_id,
            TransmissionState::Failed,
            Some(reason.into()),
            now,
        )?;
        info!(unit_id = %unit_id, "unit cancelled");
        Ok(unit)
    }

    /// Hand a terminal unit to the persistence layer
    pub fn archive(&self, unit_id: &UnitId) -> AxtermResult<TransmissionUnit> {
        self.tracker.archive(unit_id)
    }

    pub fn unit(&self, unit_id: &UnitId) -> Option<TransmissionUnit> {
        self.tracker.snapshot(unit_id)
    }

    pub fn statistics(&self) -> TransmissionStatistics {
        self.tracker.statistics()
    }

    pub fn pacing(&self) -> &SharedBucketRegistry {
        &self.pacing
    }

    pub fn tracker(&self) -> &TransmissionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl std::fmt::Debug for LinkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkEngine")
            .field("config", &self.config)
            .field("pacing", &self.pacing)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

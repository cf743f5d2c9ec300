//! Transmission unit tracking for the AXTerm runtime
//!
//! This module contains the stateful tracker that owns every live
//! transmission unit. A writer holds the unit's map entry for the whole
//! check-and-apply, so two transitions against one unit can never
//! interleave; readers only ever receive cloned snapshots.

use axterm_core::{
    AxtermError, AxtermResult, DestinationId, SessionKey, Timestamp, TransitionError,
    TransmissionMode, TransmissionState, TransmissionUnit, UnitId,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Transmission Tracker
// ----------------------------------------------------------------------------

/// Owns queued and in-flight units and serializes their transitions
#[derive(Debug, Default)]
pub struct TransmissionTracker {
    units: DashMap<UnitId, TransmissionUnit>,
}

impl TransmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new unit and return its snapshot
    pub fn submit(
        &self,
        session_key: SessionKey,
        destination: DestinationId,
        mode: TransmissionMode,
        bytes_total: u64,
        now: Timestamp,
    ) -> TransmissionUnit {
        let unit = TransmissionUnit::new(session_key, destination, mode, bytes_total, now);
        debug!(
            unit_id = %unit.id(),
            destination = %unit.destination(),
            bytes_total,
            "unit queued"
        );
        self.units.insert(unit.id(), unit.clone());
        unit
    }

    /// Adopt a unit restored by the persistence layer
    ///
    /// Returns `false` and keeps the existing unit if the id is already tracked.
    pub fn restore(&self, unit: TransmissionUnit) -> bool {
        match self.units.entry(unit.id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(unit);
                true
            }
        }
    }

    /// Current snapshot of a unit
    pub fn snapshot(&self, unit_id: &UnitId) -> Option<TransmissionUnit> {
        self.units.get(unit_id).map(|unit| unit.clone())
    }

    pub fn state(&self, unit_id: &UnitId) -> Option<TransmissionState> {
        self.units.get(unit_id).map(|unit| unit.state())
    }

    /// Whether `unit_id` may move to `proposed` right now
    pub fn can_transition(
        &self,
        unit_id: &UnitId,
        proposed: TransmissionState,
    ) -> AxtermResult<bool> {
        self.units
            .get(unit_id)
            .map(|unit| unit.can_transition(proposed))
            .ok_or_else(|| AxtermError::unknown_unit(*unit_id))
    }

    /// Apply a transition and return the updated snapshot
    pub fn apply(
        &self,
        unit_id: &UnitId,
        proposed: TransmissionState,
        reason: Option<String>,
        now: Timestamp,
    ) -> AxtermResult<TransmissionUnit> {
        self.with_unit(unit_id, |unit| {
            match unit.apply(proposed, reason, now) {
                Ok(record) => {
                    debug!(
                        unit_id = %record.unit_id,
                        from = %record.from,
                        to = %record.to,
                        attempt = record.attempt,
                        reason = record.reason.as_deref().unwrap_or(""),
                        "transition applied"
                    );
                    Ok(())
                }
                Err(err) => {
                    warn!(unit_id = %unit_id, error = %err, "transition refused");
                    Err(err.into())
                }
            }
        })
    }

    /// Apply `proposed` only if it is legal and `gate` lets it through
    ///
    /// `gate` runs under the unit's lock after the legality check, so a gate
    /// with side effects (such as spending tokens) is never charged for a
    /// transition that would be refused. A closed gate leaves the unit
    /// untouched and hands its value back as `Ok(Err(_))`.
    pub fn apply_gated<D>(
        &self,
        unit_id: &UnitId,
        proposed: TransmissionState,
        now: Timestamp,
        gate: impl FnOnce(&TransmissionUnit) -> Result<(), D>,
    ) -> AxtermResult<Result<TransmissionUnit, D>> {
        let mut unit = self
            .units
            .get_mut(unit_id)
            .ok_or_else(|| AxtermError::unknown_unit(*unit_id))?;
        if !unit.can_transition(proposed) {
            let err = TransitionError::Illegal {
                unit_id: *unit_id,
                from: unit.state(),
                to: proposed,
            };
            warn!(unit_id = %unit_id, error = %err, "transition refused");
            return Err(err.into());
        }
        if let Err(closed) = gate(unit.value()) {
            return Ok(Err(closed));
        }
        let record = unit.apply(proposed, None, now)?;
        debug!(
            unit_id = %record.unit_id,
            from = %record.from,
            to = %record.to,
            attempt = record.attempt,
            "transition applied"
        );
        Ok(Ok(unit.clone()))
    }

    /// Set the cumulative acknowledged byte count
    pub fn record_progress(
        &self,
        unit_id: &UnitId,
        bytes_acked: u64,
    ) -> AxtermResult<TransmissionUnit> {
        self.with_unit(unit_id, |unit| {
            unit.record_progress(bytes_acked).map_err(|err| {
                warn!(unit_id = %unit_id, error = %err, "progress refused");
                AxtermError::from(err)
            })
        })
    }

    /// Add newly acknowledged bytes
    pub fn acknowledge_bytes(&self, unit_id: &UnitId, delta: u64) -> AxtermResult<TransmissionUnit> {
        self.with_unit(unit_id, |unit| {
            unit.acknowledge_bytes(delta).map_err(|err| {
                warn!(unit_id = %unit_id, error = %err, "progress refused");
                AxtermError::from(err)
            })
        })
    }

    fn with_unit(
        &self,
        unit_id: &UnitId,
        f: impl FnOnce(&mut TransmissionUnit) -> AxtermResult<()>,
    ) -> AxtermResult<TransmissionUnit> {
        let mut unit = self
            .units
            .get_mut(unit_id)
            .ok_or_else(|| AxtermError::unknown_unit(*unit_id))?;
        f(unit.value_mut())?;
        Ok(unit.clone())
    }

    /// Release a terminal unit to the persistence layer
    pub fn archive(&self, unit_id: &UnitId) -> AxtermResult<TransmissionUnit> {
        match self.units.remove_if(unit_id, |_, unit| unit.is_terminal()) {
            Some((_, unit)) => {
                debug!(unit_id = %unit_id, state = %unit.state(), "unit archived");
                Ok(unit)
            }
            None => match self.state(unit_id) {
                Some(state) => Err(AxtermError::NotTerminal {
                    unit_id: *unit_id,
                    state,
                }),
                None => Err(AxtermError::unknown_unit(*unit_id)),
            },
        }
    }

    /// Snapshots of every unit sent to `destination`
    pub fn units_for_destination(&self, destination: &DestinationId) -> Vec<TransmissionUnit> {
        self.collect(|unit| unit.destination() == destination)
    }

    /// Snapshots of every unit in `state`
    pub fn units_in_state(&self, state: TransmissionState) -> Vec<TransmissionUnit> {
        self.collect(|unit| unit.state() == state)
    }

    /// Snapshots of units ready for archiving
    pub fn terminal_units(&self) -> Vec<TransmissionUnit> {
        self.collect(TransmissionUnit::is_terminal)
    }

    fn collect(&self, filter: impl Fn(&TransmissionUnit) -> bool) -> Vec<TransmissionUnit> {
        self.units
            .iter()
            .filter(|unit| filter(unit.value()))
            .map(|unit| unit.value().clone())
            .collect()
    }

    /// Get transmission statistics
    pub fn statistics(&self) -> TransmissionStatistics {
        let mut stats = TransmissionStatistics::default();

        for unit in self.units.iter() {
            match unit.state() {
                TransmissionState::Queued => stats.queued += 1,
                TransmissionState::Sending => stats.sending += 1,
                TransmissionState::Sent => stats.sent += 1,
                TransmissionState::Retrying => stats.retrying += 1,
                TransmissionState::Failed => stats.failed += 1,
            }
            stats.total_attempts += u64::from(unit.attempt_count());
            stats.total_units += 1;
        }

        stats
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Transmission Statistics
// ----------------------------------------------------------------------------

/// Per-state unit counts
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransmissionStatistics {
    pub total_units: u64,
    pub queued: u64,
    pub sending: u64,
    pub sent: u64,
    pub retrying: u64,
    pub failed: u64,
    /// Entries into `sending` across all units
    pub total_attempts: u64,
}

impl TransmissionStatistics {
    /// Calculate success rate (sent / total)
    pub fn success_rate(&self) -> f64 {
        if self.total_units == 0 {
            0.0
        } else {
            self.sent as f64 / self.total_units as f64
        }
    }

    /// Calculate failure rate (failed / total)
    pub fn failure_rate(&self) -> f64 {
        if self.total_units == 0 {
            0.0
        } else {
            self.failed as f64 / self.total_units as f64
        }
    }

    /// Calculate average attempts per unit
    pub fn average_attempts(&self) -> f64 {
        if self.total_units == 0 {
            0.0
        } else {
            self.total_attempts as f64 / self.total_units as f64
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn submit_test_unit(tracker: &TransmissionTracker, bytes_total: u64) -> UnitId {
        tracker
            .submit(
                SessionKey::new("session"),
                DestinationId::new("N0CALL"),
                TransmissionMode::Unit,
                bytes_total,
                Timestamp::ZERO,
            )
            .id()
    }

    #[test]
    fn test_tracker_lifecycle() {
        let tracker = TransmissionTracker::new();
        let id = submit_test_unit(&tracker, 32);

        assert_eq!(tracker.state(&id), Some(TransmissionState::Queued));
        assert!(tracker.can_transition(&id, TransmissionState::Sending).unwrap());
        assert!(!tracker.can_transition(&id, TransmissionState::Sent).unwrap());

        let unit = tracker
            .apply(&id, TransmissionState::Sending, None, Timestamp::new(10))
            .unwrap();
        assert_eq!(unit.attempt_count(), 1);

        tracker.acknowledge_bytes(&id, 32).unwrap();
        tracker
            .apply(&id, TransmissionState::Sent, None, Timestamp::new(20))
            .unwrap();

        let stats = tracker.statistics();
        assert_eq!(stats.total_units, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.success_rate(), 1.0);
        assert_eq!(stats.average_attempts(), 1.0);
    }

    #[test]
    fn test_refused_transition_is_reported() {
        let tracker = TransmissionTracker::new();
        let id = submit_test_unit(&tracker, 32);

        let err = tracker
            .apply(&id, TransmissionState::Retrying, None, Timestamp::new(1))
            .unwrap_err();
        assert!(matches!(
            err,
            AxtermError::Transition(TransitionError::Illegal { .. })
        ));
        assert_eq!(tracker.state(&id), Some(TransmissionState::Queued));
    }

    #[test]
    fn test_unknown_unit() {
        let tracker = TransmissionTracker::new();
        let missing = UnitId::new();

        assert!(matches!(
            tracker.can_transition(&missing, TransmissionState::Sending),
            Err(AxtermError::UnknownUnit { .. })
        ));
        assert!(tracker.snapshot(&missing).is_none());
    }

    #[test]
    fn test_archive_only_releases_terminal_units() {
        let tracker = TransmissionTracker::new();
        let id = submit_test_unit(&tracker, 8);

        assert!(matches!(
            tracker.archive(&id),
            Err(AxtermError::NotTerminal { state: TransmissionState::Queued, .. })
        ));

        tracker
            .apply(&id, TransmissionState::Failed, Some("cancelled".into()), Timestamp::new(1))
            .unwrap();
        assert_eq!(tracker.terminal_units().len(), 1);

        let archived = tracker.archive(&id).unwrap();
        assert_eq!(archived.last_error(), Some("cancelled"));
        assert!(tracker.is_empty());
        assert!(matches!(tracker.archive(&id), Err(AxtermError::UnknownUnit { .. })));
    }

    #[test]
    fn test_restore_does_not_overwrite() {
        let tracker = TransmissionTracker::new();
        let id = submit_test_unit(&tracker, 8);
        let mut copy = tracker.snapshot(&id).unwrap();
        copy.apply(TransmissionState::Failed, None, Timestamp::new(1)).unwrap();

        assert!(!tracker.restore(copy));
        assert_eq!(tracker.state(&id), Some(TransmissionState::Queued));
    }

    #[test]
    fn test_single_writer_per_unit() {
        let tracker = TransmissionTracker::new();
        let id = submit_test_unit(&tracker, 8);
        let winners = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if tracker
                        .apply(&id, TransmissionState::Sending, None, Timestamp::new(1))
                        .is_ok()
                    {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.snapshot(&id).unwrap().attempt_count(), 1);
    }

    #[test]
    fn test_queries_by_destination_and_state() {
        let tracker = TransmissionTracker::new();
        submit_test_unit(&tracker, 1);
        let other = tracker
            .submit(
                SessionKey::new("other"),
                DestinationId::new("K1ABC"),
                TransmissionMode::Chunked,
                4,
                Timestamp::ZERO,
            )
            .id();
        tracker
            .apply(&other, TransmissionState::Sending, None, Timestamp::new(1))
            .unwrap();

        assert_eq!(tracker.units_for_destination(&DestinationId::new("K1ABC")).len(), 1);
        assert_eq!(tracker.units_in_state(TransmissionState::Queued).len(), 1);
        assert_eq!(tracker.units_in_state(TransmissionState::Sending).len(), 1);
    }
}

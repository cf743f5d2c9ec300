//! Retry scheduling seam
//!
//! The lifecycle records that a retry is due but never decides when. Callers
//! choose the delay (backoff policy lives with them) and hand it to a
//! scheduler implementing this trait.

use core::time::Duration;

use crate::protocol::TransmissionUnit;

/// Collaborator that arranges for a unit to be attempted again later
pub trait RetryScheduler {
    /// Request another attempt for `unit` no sooner than `after` from now
    fn schedule_retry(&self, unit: &TransmissionUnit, after: Duration);
}

impl<S: RetryScheduler + ?Sized> RetryScheduler for &S {
    fn schedule_retry(&self, unit: &TransmissionUnit, after: Duration) {
        (**self).schedule_retry(unit, after)
    }
}

#[cfg(feature = "std")]
impl<S: RetryScheduler + ?Sized> RetryScheduler for std::sync::Arc<S> {
    fn schedule_retry(&self, unit: &TransmissionUnit, after: Duration) {
        (**self).schedule_retry(unit, after)
    }
}

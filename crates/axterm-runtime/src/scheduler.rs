//! Timer-backed retry scheduling
//!
//! The delay always comes from the caller's backoff policy. This scheduler
//! only waits it out on the tokio timer and then announces the unit on a
//! channel, where the send loop picks it up and calls `try_send` again.

use std::time::Duration;

use axterm_core::{DestinationId, RetryScheduler, TransmissionUnit, UnitId};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

/// A retry whose delay has elapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDue {
    pub unit_id: UnitId,
    pub destination: DestinationId,
    /// Attempts made before this retry
    pub attempts: u32,
}

pub type RetryReceiver = mpsc::UnboundedReceiver<RetryDue>;

/// [`RetryScheduler`] that sleeps on the tokio timer
#[derive(Debug, Clone)]
pub struct ChannelRetryScheduler {
    sender: mpsc::UnboundedSender<RetryDue>,
    handle: Handle,
}

impl ChannelRetryScheduler {
    /// Create a scheduler spawning its timers on `handle`
    pub fn new(handle: Handle) -> (Self, RetryReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, handle }, receiver)
    }

    /// Create a scheduler on the runtime the caller is running in
    pub fn for_current_runtime() -> Option<(Self, RetryReceiver)> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl RetryScheduler for ChannelRetryScheduler {
    fn schedule_retry(&self, unit: &TransmissionUnit, after: Duration) {
        let due = RetryDue {
            unit_id: unit.id(),
            destination: unit.destination().clone(),
            attempts: unit.attempt_count(),
        };
        let sender = self.sender.clone();
        debug!(unit_id = %due.unit_id, ?after, "retry scheduled");
        self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            if sender.send(due).is_err() {
                debug!("retry receiver dropped before delivery");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axterm_core::{SessionKey, Timestamp, TransmissionMode};

    fn create_test_unit(callsign: &str) -> TransmissionUnit {
        TransmissionUnit::new(
            SessionKey::new("s"),
            DestinationId::new(callsign),
            TransmissionMode::Unit,
            16,
            Timestamp::ZERO,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_delivered_in_delay_order() {
        let (scheduler, mut receiver) =
            ChannelRetryScheduler::for_current_runtime().expect("inside a runtime");
        let slow = create_test_unit("SLOW");
        let fast = create_test_unit("FAST");

        scheduler.schedule_retry(&slow, Duration::from_secs(5));
        scheduler.schedule_retry(&fast, Duration::from_secs(1));

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.unit_id, fast.id());
        assert_eq!(second.unit_id, slow.id());
        assert_eq!(second.destination, DestinationId::new("SLOW"));
    }

    #[test]
    fn test_no_runtime_outside_tokio() {
        assert!(ChannelRetryScheduler::for_current_runtime().is_none());
    }
}

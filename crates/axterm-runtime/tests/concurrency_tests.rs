//! Concurrency tests for the shared runtime structures
//!
//! Many tokio worker threads hammer the registry, tracker and sequencer at
//! once; the counts afterwards must match what serialized execution would
//! have produced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axterm_core::precedes;
use axterm_runtime::{
    DestinationId, LinkEngineBuilder, RateLimitConfig, SequencerConfig, SessionKey,
    SharedBucketRegistry, SharedSequencer, Timestamp, TransmissionMode, TransmissionState,
};
use futures::future::join_all;
use tokio::runtime::Handle;

fn create_test_destination(id: u8) -> DestinationId {
    DestinationId::new(format!("N0CALL-{}", id))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_reference_creates_one_bucket() {
    let registry = Arc::new(SharedBucketRegistry::new(RateLimitConfig::new(0.001, 64.0)));
    let granted = Arc::new(AtomicU64::new(0));

    let tasks = (0..16).map(|_| {
        let registry = registry.clone();
        let granted = granted.clone();
        tokio::spawn(async move {
            for _ in 0..16 {
                if registry.admit(&create_test_destination(7), 1.0, Timestamp::ZERO) {
                    granted.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
    });
    for result in join_all(tasks).await {
        result.expect("admission task panicked");
    }

    assert_eq!(registry.len(), 1);
    assert_eq!(granted.load(Ordering::SeqCst), 64);
    assert!(registry.available(&create_test_destination(7), Timestamp::ZERO) < 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_respect_budget() {
    let (engine, _retries) = LinkEngineBuilder::new()
        .with_pacing(RateLimitConfig::new(0.001, 100.0))
        .build_with_channel_scheduler(Handle::current())
        .expect("valid engine configuration");
    let engine = Arc::new(engine);

    let ids: Vec<_> = (0..40)
        .map(|_| {
            engine
                .submit(
                    SessionKey::new("stress"),
                    create_test_destination(1),
                    TransmissionMode::Unit,
                    10,
                    Timestamp::ZERO,
                )
                .id()
        })
        .collect();

    // Every unit is raced by two senders; each unit may start at most once
    let tasks = ids.iter().chain(ids.iter()).map(|id| {
        let engine = engine.clone();
        let id = *id;
        tokio::spawn(async move { engine.try_send(&id, Timestamp::ZERO) })
    });
    let mut granted = 0;
    for result in join_all(tasks).await {
        if let Ok(decision) = result.expect("send task panicked") {
            if decision.is_granted() {
                granted += 1;
            }
        }
    }

    let stats = engine.statistics();
    assert_eq!(granted, 10);
    assert_eq!(stats.sending, 10);
    assert_eq!(stats.queued, 30);
    assert_eq!(stats.total_attempts, 10);
    assert_eq!(engine.tracker().units_in_state(TransmissionState::Sending).len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequencer_readers_never_see_disorder() {
    let sequencer: Arc<SharedSequencer<(Timestamp, u64)>> =
        Arc::new(SharedSequencer::new(SequencerConfig::default()));

    let writers = (0..4u64).map(|worker| {
        let sequencer = sequencer.clone();
        tokio::spawn(async move {
            for i in 0..250u64 {
                sequencer.insert((Timestamp::new((i * 31 + worker) % 97), worker * 1_000 + i));
                tokio::task::yield_now().await;
            }
        })
    });
    let reader = {
        let sequencer = sequencer.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let ordered = sequencer
                    .with_sequence(|items| items.windows(2).all(|w| precedes(&w[0], &w[1])));
                assert!(ordered);
                tokio::task::yield_now().await;
            }
        })
    };

    for result in join_all(writers).await {
        result.expect("writer panicked");
    }
    reader.await.expect("reader panicked");

    let items = sequencer.snapshot();
    assert_eq!(items.len(), 1_000);
    assert!(items.windows(2).all(|w| precedes(&w[0], &w[1])));
}

//! Link Engine Builder API
//!
//! Provides a builder-style API for consumers (CLI, daemons, tests) to turn a
//! [`RuntimeConfig`] and a retry scheduler into a ready [`LinkEngine`].

use std::sync::Arc;

use axterm_core::{
    AxtermError, AxtermResult, RateLimitConfig, RetryScheduler, Sequenced, SequencerConfig,
};
use tokio::runtime::Handle;
use tracing::info;

use crate::config::{LoggingConfig, RuntimeConfig};
use crate::engine::{LinkEngine, SharedRetryScheduler};
use crate::logging::init_tracing;
use crate::scheduler::{ChannelRetryScheduler, RetryReceiver};
use crate::sequencer::SharedSequencer;

// ----------------------------------------------------------------------------
// Link Engine Builder
// ----------------------------------------------------------------------------

/// Builder for a [`LinkEngine`]
#[derive(Default)]
pub struct LinkEngineBuilder {
    config: RuntimeConfig,
    scheduler: Option<SharedRetryScheduler>,
    enable_logging: bool,
}

impl LinkEngineBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Override the pacing defaults
    pub fn with_pacing(mut self, pacing: RateLimitConfig) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Override sequencer retention
    pub fn with_sequencer(mut self, sequencer: SequencerConfig) -> Self {
        self.config.sequencer = sequencer;
        self
    }

    /// Install the global tracing subscriber on build
    pub fn with_console_logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self.enable_logging = true;
        self
    }

    /// Use `scheduler` for retries
    pub fn with_scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: RetryScheduler + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Build a sequencer for received items with the configured retention
    pub fn build_sequencer<T: Sequenced>(&self) -> SharedSequencer<T> {
        SharedSequencer::new(self.config.sequencer)
    }

    /// Validate the configuration and build the engine
    ///
    /// Fails if no scheduler was supplied.
    pub fn build(self) -> AxtermResult<LinkEngine> {
        self.config
            .validate()
            .map_err(|e| AxtermError::config_error(e.to_string()))?;
        let scheduler = self
            .scheduler
            .ok_or_else(|| AxtermError::config_error("no retry scheduler configured"))?;

        if self.enable_logging {
            init_tracing(&self.config.logging);
        }
        info!(
            rate_per_second = self.config.pacing.rate_per_second,
            capacity = self.config.pacing.capacity,
            "link engine ready"
        );
        Ok(LinkEngine::new(self.config, scheduler))
    }

    /// Build with a [`ChannelRetryScheduler`] on `handle`
    ///
    /// Due retries arrive on the returned receiver.
    pub fn build_with_channel_scheduler(
        self,
        handle: Handle,
    ) -> AxtermResult<(LinkEngine, RetryReceiver)> {
        let (scheduler, receiver) = ChannelRetryScheduler::new(handle);
        let engine = self.with_scheduler(scheduler).build()?;
        Ok((engine, receiver))
    }
}

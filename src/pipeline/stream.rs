// src/pipeline/stream.rs

//! Streaming ingestion.
//!
//! One long-lived subscription per filter list. Received items append to a
//! daily-rotating output file; any connect failure or drop backs off
//! exponentially (bounded) and reconnects. There is deliberately no
//! resumption logic here: gaps during downtime are accepted losses, covered
//! by the periodic search collectors.

use std::time::Duration;

use crate::error::Result;
use crate::services::StreamSource;
use crate::storage::StreamRotator;

/// Where the ingester currently is in its connect/stream/backoff cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
    BackingOff,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::BackingOff => "backing_off",
        }
    }
}

/// Bounded exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
        }
    }

    /// Delay before the next reconnect attempt: initial * 2^attempt, capped.
    pub fn next_delay(&mut self) -> Duration {
        let shift = self.attempt.min(16);
        let secs = self
            .initial
            .as_secs()
            .saturating_mul(1 << shift)
            .min(self.max.as_secs());
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_secs(secs)
    }

    /// Reset after a successfully received item.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// The streaming ingester.
pub struct StreamIngester<'a> {
    source: &'a dyn StreamSource,
    rotator: StreamRotator,
    filters: Vec<String>,
    backoff: Backoff,
    state: ConnectionState,
}

impl<'a> StreamIngester<'a> {
    pub fn new(
        source: &'a dyn StreamSource,
        rotator: StreamRotator,
        filters: Vec<String>,
        backoff: Backoff,
    ) -> Self {
        Self {
            source,
            rotator,
            filters,
            backoff,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run forever. Only a persistence failure escapes; everything on the
    /// network side is absorbed by backoff-and-reconnect.
    pub async fn run(&mut self) -> Result<()> {
        log::info!("Starting stream ingester with {} filters", self.filters.len());
        loop {
            let received = self.run_session().await?;
            if received > 0 {
                log::info!("Session ended after {received} items");
            }

            self.state = ConnectionState::BackingOff;
            let delay = self.backoff.next_delay();
            log::info!(
                "{}: reconnecting in {}s (attempt {})",
                self.state.as_str(),
                delay.as_secs(),
                self.backoff.attempt()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One connect-and-drain session. Returns the number of items received;
    /// connection-level failures end the session, they never fail it.
    async fn run_session(&mut self) -> Result<u64> {
        self.state = ConnectionState::Connecting;

        let mut connection = match self.source.connect(&self.filters).await {
            Ok(connection) => connection,
            Err(error) => {
                log::warn!("Connect failed: {error}");
                return Ok(0);
            }
        };

        self.state = ConnectionState::Streaming;
        let mut received = 0u64;

        loop {
            match connection.next_item().await {
                Ok(Some(item)) => {
                    // A write failure is fatal: with output gone there is
                    // nothing useful left to do.
                    self.rotator.append(&item).await?;
                    self.backoff.reset();
                    received += 1;
                }
                Ok(None) => {
                    log::info!("Stream closed by upstream");
                    return Ok(received);
                }
                Err(error) => {
                    log::warn!("Stream dropped: {error}");
                    return Ok(received);
                }
            }
        }
    }
}

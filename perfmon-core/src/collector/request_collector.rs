//! Entry point fed by the host once per completed request
//!
//! Events are buffered under one lock together with the delivery flags.
//! Every arrival evaluates the flush gate; when it opens, a background task
//! posts a snapshot of the buffer and, depending on the response, drains
//! that many events from the head.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::Level;

use crate::config::CollectorConfig;
use crate::error::{Error, Result};

use super::client::{DeliveryRequest, HttpTransport, Transport};
use super::clock::{Clock, SystemClock};
use super::delivery::{DeliveryStats, Disposition};
use super::event::{RequestEvent, RequestPayload};
use super::log::{LogSink, TracingSink};
use super::scheduler::{DeliveryState, FlushDecision};

/// Buffers request events and ships them to the ingestion endpoint
///
/// Cloning is cheap; clones share the buffer and the delivery state.
pub struct RequestCollector<T: Transport = HttpTransport> {
    shared: Arc<Shared<T>>,
    runtime: Handle,
}

struct Shared<T> {
    config: CollectorConfig,
    flush_interval: TimeDelta,
    transport: T,
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
    state: Mutex<DeliveryState>,
    /// Signalled whenever an attempt finishes
    idle: Notify,
}

impl RequestCollector<HttpTransport> {
    /// Create a collector posting over HTTP
    ///
    /// Returns None if the endpoint or the API key is not configured. The
    /// collector spawns deliveries on the current Tokio runtime.
    pub fn activate(config: CollectorConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }

        let transport = HttpTransport::new(&config)?;
        RequestCollector::builder(config, transport).build().map(Some)
    }
}

impl<T: Transport> RequestCollector<T> {
    /// Start building a collector around an arbitrary transport
    pub fn builder(config: CollectorConfig, transport: T) -> CollectorBuilder<T> {
        CollectorBuilder {
            config,
            transport,
            clock: Arc::new(SystemClock),
            log: Arc::new(TracingSink),
            runtime: None,
        }
    }

    /// Record one completed request
    ///
    /// Never blocks on the network and never fails; delivery problems only
    /// show up in the logs.
    pub fn on_event(&self, payload: &RequestPayload, start: DateTime<Utc>, finish: DateTime<Utc>) {
        if let Some(event) = RequestEvent::from_payload(payload, start, finish) {
            self.shared.state.lock().buffer.append(event);
        }
        self.check_flush();
    }

    /// Evaluate the flush gate, starting a delivery if it is open
    pub fn check_flush(&self) {
        let now = self.shared.clock.now();
        let decision = self
            .shared
            .state
            .lock()
            .evaluate(now, self.shared.flush_interval);

        match decision {
            FlushDecision::Start(snapshot) => {
                let guard = AttemptGuard {
                    shared: Arc::clone(&self.shared),
                };
                // Spawned outside the lock: a runtime that is shutting down
                // drops the task, and with it the guard, inside `spawn`.
                let worker = self.runtime.spawn(deliver(guard, snapshot));
                self.shared.state.lock().worker = Some(worker);
            }
            FlushDecision::InFlight => self.shared.log.log(
                Level::DEBUG,
                "Already sending data, waiting for current push to finish",
            ),
            FlushDecision::TooSoon | FlushDecision::Closed => {}
        }
    }

    /// Stop starting deliveries and wait for the running one to finish
    ///
    /// Buffered events that were not part of the running delivery are
    /// dropped with the collector.
    pub async fn shutdown(&self) {
        loop {
            let idle = self.shared.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            let (worker, in_flight) = {
                let mut state = self.shared.state.lock();
                state.closed = true;
                (state.worker.take(), state.in_flight)
            };

            match worker {
                Some(worker) => {
                    if let Err(e) = worker.await {
                        tracing::error!(error = %e, "Delivery task did not complete");
                    }
                }
                // Started, but its handle is not stored yet
                None if in_flight => idle.await,
                None => return,
            }
        }
    }

    /// Number of buffered events
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Copy of the buffered events, oldest first
    pub fn pending(&self) -> Vec<RequestEvent> {
        self.shared.state.lock().buffer.snapshot()
    }

    /// Whether a delivery is running
    pub fn is_in_flight(&self) -> bool {
        self.shared.state.lock().in_flight
    }

    /// When the last delivery attempt finished (construction time before the first)
    pub fn last_attempt_at(&self) -> DateTime<Utc> {
        self.shared.state.lock().last_attempt_at
    }

    /// Get current delivery statistics
    pub fn stats(&self) -> DeliveryStats {
        self.shared.state.lock().stats.clone()
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.shared.config
    }
}

impl<T: Transport> Clone for RequestCollector<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            runtime: self.runtime.clone(),
        }
    }
}

/// Builder for [`RequestCollector`]
pub struct CollectorBuilder<T> {
    config: CollectorConfig,
    transport: T,
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
    runtime: Option<Handle>,
}

impl<T: Transport> CollectorBuilder<T> {
    /// Time source for the flush gate
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Destination of the collector's log lines
    pub fn log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Runtime deliveries are spawned on (defaults to the current one)
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<RequestCollector<T>> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| Error::Collector(format!("no Tokio runtime available: {}", e)))?,
        };

        let flush_interval = TimeDelta::from_std(self.config.flush_interval())
            .map_err(|e| Error::Config(format!("invalid flush interval: {}", e)))?;

        let state = DeliveryState::new(self.clock.now());

        Ok(RequestCollector {
            shared: Arc::new(Shared {
                config: self.config,
                flush_interval,
                transport: self.transport,
                clock: self.clock,
                log: self.log,
                state: Mutex::new(state),
                idle: Notify::new(),
            }),
            runtime,
        })
    }
}

/// Resets the delivery flags when an attempt ends
///
/// Created before the task is spawned, so the flags are also reset when the
/// task panics or is dropped without ever being polled.
struct AttemptGuard<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for AttemptGuard<T> {
    fn drop(&mut self) {
        let now = self.shared.clock.now();
        self.shared.state.lock().finish_attempt(now);
        self.shared.idle.notify_waiters();
    }
}

/// Body of the background delivery task
async fn deliver<T: Transport>(guard: AttemptGuard<T>, snapshot: Vec<RequestEvent>) {
    let shared = &guard.shared;
    let batch_len = snapshot.len();

    shared
        .log
        .log(Level::DEBUG, &format!("Sending {} requests", batch_len));

    let outcome = match DeliveryRequest::build(&shared.config, &snapshot) {
        Ok(request) => shared.transport.send(request).await,
        Err(e) => Err(e),
    };
    let disposition = Disposition::classify(outcome);

    let (level, message) = disposition.log_line();
    shared.log.log(level, &message);
    tracing::debug!(
        outcome = disposition.kind(),
        batch = batch_len,
        "Delivery attempt finished"
    );

    {
        let mut state = shared.state.lock();
        if disposition.drains() {
            state.buffer.drain(batch_len);
        }
        state.stats.record(&disposition, batch_len);
    }
    drop(guard);
}

//! Flush gate evaluated on every event arrival
//!
//! A delivery starts when the flush interval has elapsed since the last
//! attempt and no other delivery is running. The snapshot handed to the
//! worker is taken in the same critical section that raises the in-flight
//! flag, so events appended during the delivery stay buffered for the next
//! cycle.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use super::buffer::EventBuffer;
use super::delivery::DeliveryStats;
use super::event::RequestEvent;

/// Everything guarded by the collector's lock
#[derive(Debug)]
pub(crate) struct DeliveryState {
    pub buffer: EventBuffer<RequestEvent>,
    /// Completion time of the most recent attempt (initially construction time)
    pub last_attempt_at: DateTime<Utc>,
    /// True exactly while a delivery worker runs
    pub in_flight: bool,
    /// Set by shutdown; no new deliveries start afterwards
    pub closed: bool,
    /// Handle of the most recently started worker
    pub worker: Option<JoinHandle<()>>,
    pub stats: DeliveryStats,
}

/// Outcome of one evaluation of the flush gate
#[derive(Debug, PartialEq)]
pub(crate) enum FlushDecision {
    /// A delivery is already running
    InFlight,
    /// The interval has not elapsed yet
    TooSoon,
    /// The collector is shutting down
    Closed,
    /// A delivery was started for this snapshot
    Start(Vec<RequestEvent>),
}

impl DeliveryState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            buffer: EventBuffer::new(),
            last_attempt_at: now,
            in_flight: false,
            closed: false,
            worker: None,
            stats: DeliveryStats::default(),
        }
    }

    /// Decide whether to start a delivery, raising the in-flight flag if so
    pub fn evaluate(&mut self, now: DateTime<Utc>, interval: TimeDelta) -> FlushDecision {
        if self.in_flight {
            return FlushDecision::InFlight;
        }
        if self.closed {
            return FlushDecision::Closed;
        }
        if now - self.last_attempt_at < interval {
            return FlushDecision::TooSoon;
        }

        self.in_flight = true;
        self.stats.attempts += 1;
        FlushDecision::Start(self.buffer.snapshot())
    }

    /// Reset after an attempt, whatever its outcome
    pub fn finish_attempt(&mut self, now: DateTime<Utc>) {
        self.last_attempt_at = now;
        self.in_flight = false;
    }
}

//! Classification of delivery attempts
//!
//! | Outcome                 | Buffer        | Log                              |
//! |-------------------------|---------------|----------------------------------|
//! | 200                     | drained       | debug `Data accepted`            |
//! | 401                     | drained       | error `Invalid API key`          |
//! | 400                     | drained       | error `Bad request`              |
//! | other status            | kept          | error `Unhandled response code`  |
//! | no response             | kept          | error `Connection error`         |
//!
//! 400 and 401 will fail the same way on every retry, so the batch is
//! discarded. Everything else may be transient and is retried on the next
//! cycle.

use tracing::Level;

use crate::error::DeliveryError;

/// Why the endpoint refused a batch for good
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// 401
    InvalidApiKey,
    /// 400
    BadRequest,
}

/// Final state of a single delivery attempt
#[derive(Debug)]
pub enum Disposition {
    /// 200, the batch was ingested
    Delivered,
    /// 400 or 401, the batch is discarded
    Rejected(Rejection),
    /// Any other status code, the batch is kept
    Unknown(u16),
    /// No response was obtained, the batch is kept
    Failed(DeliveryError),
}

impl Disposition {
    /// Classify the result of a transport call
    pub fn classify(outcome: Result<u16, DeliveryError>) -> Self {
        match outcome {
            Ok(200) => Disposition::Delivered,
            Ok(401) => Disposition::Rejected(Rejection::InvalidApiKey),
            Ok(400) => Disposition::Rejected(Rejection::BadRequest),
            Ok(code) => Disposition::Unknown(code),
            Err(e) => Disposition::Failed(e),
        }
    }

    /// Whether the snapshot should be removed from the buffer
    pub fn drains(&self) -> bool {
        matches!(self, Disposition::Delivered | Disposition::Rejected(_))
    }

    /// Stable identifier used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Disposition::Delivered => "delivered",
            Disposition::Rejected(Rejection::InvalidApiKey) => "invalid_api_key",
            Disposition::Rejected(Rejection::BadRequest) => "bad_request",
            Disposition::Unknown(_) => "unexpected_status",
            Disposition::Failed(e) => e.kind(),
        }
    }

    /// Level and message reported through the collector's log sink
    pub fn log_line(&self) -> (Level, String) {
        match self {
            Disposition::Delivered => (Level::DEBUG, "Data accepted".to_string()),
            Disposition::Rejected(Rejection::InvalidApiKey) => {
                (Level::ERROR, "Invalid API key".to_string())
            }
            Disposition::Rejected(Rejection::BadRequest) => {
                (Level::ERROR, "Bad request".to_string())
            }
            Disposition::Unknown(code) => {
                (Level::ERROR, format!("Unhandled response code: {}", code))
            }
            Disposition::Failed(e) => (Level::ERROR, format!("Connection error: {}", e)),
        }
    }
}

/// Delivery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Deliveries started
    pub attempts: usize,
    /// Attempts answered with 200
    pub delivered: usize,
    /// Attempts answered with 400 or 401
    pub rejected: usize,
    /// Attempts answered with any other status
    pub unknown: usize,
    /// Attempts that got no response
    pub failed: usize,
    /// Events removed from the buffer after a 200
    pub events_sent: usize,
    /// Events removed from the buffer after a 400 or 401
    pub events_discarded: usize,
}

impl DeliveryStats {
    /// Account for a finished attempt over `batch_len` events
    pub fn record(&mut self, disposition: &Disposition, batch_len: usize) {
        match disposition {
            Disposition::Delivered => {
                self.delivered += 1;
                self.events_sent += batch_len;
            }
            Disposition::Rejected(_) => {
                self.rejected += 1;
                self.events_discarded += batch_len;
            }
            Disposition::Unknown(_) => self.unknown += 1,
            Disposition::Failed(_) => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        assert!(matches!(Disposition::classify(Ok(200)), Disposition::Delivered));
        assert!(matches!(
            Disposition::classify(Ok(401)),
            Disposition::Rejected(Rejection::InvalidApiKey)
        ));
        assert!(matches!(
            Disposition::classify(Ok(400)),
            Disposition::Rejected(Rejection::BadRequest)
        ));
        assert!(matches!(Disposition::classify(Ok(500)), Disposition::Unknown(500)));
        // Other 2xx codes are not acceptance
        assert!(matches!(Disposition::classify(Ok(201)), Disposition::Unknown(201)));
    }

    #[test]
    fn test_only_delivered_and_rejected_drain() {
        assert!(Disposition::Delivered.drains());
        assert!(Disposition::Rejected(Rejection::BadRequest).drains());
        assert!(!Disposition::Unknown(503).drains());
        assert!(!Disposition::Failed(DeliveryError::Transport("reset".into())).drains());
    }

    #[test]
    fn test_log_lines() {
        assert_eq!(
            Disposition::Delivered.log_line(),
            (Level::DEBUG, "Data accepted".to_string())
        );
        assert_eq!(
            Disposition::classify(Ok(401)).log_line(),
            (Level::ERROR, "Invalid API key".to_string())
        );
        assert_eq!(
            Disposition::classify(Ok(400)).log_line(),
            (Level::ERROR, "Bad request".to_string())
        );
        assert_eq!(
            Disposition::classify(Ok(500)).log_line(),
            (Level::ERROR, "Unhandled response code: 500".to_string())
        );
        assert_eq!(
            Disposition::classify(Err(DeliveryError::Transport(
                "Can not connect!??!".to_string()
            )))
            .log_line(),
            (Level::ERROR, "Connection error: Can not connect!??!".to_string())
        );
    }

    #[test]
    fn test_stats_record() {
        let mut stats = DeliveryStats::default();
        stats.record(&Disposition::Delivered, 5);
        stats.record(&Disposition::Rejected(Rejection::InvalidApiKey), 2);
        stats.record(&Disposition::Unknown(500), 3);

        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.events_sent, 5);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.events_discarded, 2);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.failed, 0);
    }
}

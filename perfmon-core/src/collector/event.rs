//! Normalization of host payloads into buffered request events
//!
//! The host reports one payload per completed request together with the
//! request's start and finish timestamps:
//!
//! ```text
//! payload {controller, action, view_runtime, db_runtime, path, params, ...}
//!     + start, finish
//!         → RequestEvent {controller, action, view_runtime, db_runtime, ..., total_runtime, time}
//! ```
//!
//! - `path` and `params` are stripped before storage
//! - `total_runtime` is `finish - start` in milliseconds
//! - `time` is the start timestamp
//! - payloads carrying an `exception` key are dropped

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw attributes reported by the host for one request
pub type RequestPayload = Map<String, Value>;

/// Payload key marking a request that raised
pub const EXCEPTION_KEY: &str = "exception";

/// Payload keys never stored
pub const STRIPPED_KEYS: [&str; 2] = ["path", "params"];

/// One completed request, reduced to timing and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Host-supplied attributes (controller, action, runtimes, format, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    /// Wall time of the request in milliseconds
    pub total_runtime: f64,

    /// When the request started
    pub time: DateTime<Utc>,
}

impl RequestEvent {
    /// Build an event from a host payload
    ///
    /// Returns `None` when the payload describes a failed request.
    pub fn from_payload(
        payload: &RequestPayload,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Option<Self> {
        if payload.contains_key(EXCEPTION_KEY) {
            return None;
        }

        let attributes = payload
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(RequestEvent {
            attributes,
            total_runtime: runtime_ms(start, finish),
            time: start,
        })
    }

    /// Look up a host-supplied attribute
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Stripped keys, plus the computed ones which always win over host values
fn is_reserved(key: &str) -> bool {
    STRIPPED_KEYS.contains(&key) || key == "total_runtime" || key == "time"
}

fn runtime_ms(start: DateTime<Utc>, finish: DateTime<Utc>) -> f64 {
    let elapsed = finish - start;
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => elapsed.num_milliseconds() as f64,
    }
}

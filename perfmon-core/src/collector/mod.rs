//! Request event collector
//!
//! Buffers one event per completed host request and periodically posts the
//! buffer to an ingestion endpoint.
//!
//! ## Delivery cycle
//!
//! ```text
//! Idle → InFlight → {Delivered, Rejected, Unknown, Failed} → Idle
//! ```
//!
//! - At most one delivery runs at a time
//! - A delivery starts on event arrival once the flush interval
//!   (default 5 minutes) has passed since the previous attempt
//! - Delivered and Rejected drain the posted snapshot; Unknown and Failed
//!   keep it for the next cycle
//! - The buffer is unbounded and lives in memory only
//!
//! ## Usage
//!
//! ```toml
//! [collector]
//! service_url = "https://perfmon.example.com/requests"
//! api_key = "12345"
//! ```
//!
//! ```rust,no_run
//! # async fn run() -> perfmon_core::Result<()> {
//! use perfmon_core::collector::RequestCollector;
//! use perfmon_core::Config;
//!
//! let config = Config::load()?;
//! if let Some(collector) = RequestCollector::activate(config.collector)? {
//!     let now = chrono::Utc::now();
//!     collector.on_event(&Default::default(), now, now);
//!     collector.shutdown().await;
//! }
//! # Ok(())
//! # }
//! ```

mod buffer;
mod client;
mod clock;
mod delivery;
mod event;
mod log;
mod request_collector;
mod scheduler;

pub use buffer::EventBuffer;
pub use client::{form_body, DeliveryRequest, HttpTransport, Transport};
pub use clock::{Clock, SystemClock};
pub use delivery::{DeliveryStats, Disposition, Rejection};
pub use event::{RequestEvent, RequestPayload, EXCEPTION_KEY, STRIPPED_KEYS};
pub use log::{LogSink, TracingSink, COMPONENT, COMPONENT_FIELD};
pub use request_collector::{CollectorBuilder, RequestCollector};

//! # perfmon-core
//!
//! Core library for perfmon - an in-process request performance collector.
//!
//! This library provides:
//! - Normalization of per-request payloads into timing events
//! - A shared, lock-guarded event buffer with a time-based flush gate
//! - Background HTTP delivery with response-driven draining
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use perfmon_core::Config;
//!
//! let config = Config::load().expect("failed to load config");
//! assert!(config.collector.flush_interval_secs > 0);
//! ```

// Re-export commonly used items at the crate root
pub use collector::{RequestCollector, RequestEvent, RequestPayload};
pub use config::{CollectorConfig, Config, SslVerifyMode};
pub use error::{DeliveryError, Error, Result};

// Public modules
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;

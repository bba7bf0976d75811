//! Component-tagged log sink used by the collector

use tracing::Level;

/// Tag attached to every collector log line
pub const COMPONENT: &str = "PERFMON";

/// Name of the field carrying [`COMPONENT`]
pub const COMPONENT_FIELD: &str = "component";

/// Leveled logging capability consumed by the collector
///
/// The collector only emits [`Level::DEBUG`] and [`Level::ERROR`].
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: Level, message: &str);
}

/// Forwards collector messages to `tracing`, tagged with [`COMPONENT`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(component = COMPONENT, "{}", message),
            Level::WARN => tracing::warn!(component = COMPONENT, "{}", message),
            Level::INFO => tracing::info!(component = COMPONENT, "{}", message),
            Level::DEBUG => tracing::debug!(component = COMPONENT, "{}", message),
            _ => tracing::trace!(component = COMPONENT, "{}", message),
        }
    }
}

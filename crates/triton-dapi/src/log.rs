//! The logging sink interface every pipeline stage receives, plus the
//! default `tracing`-backed implementation.
//!
//! A host can supply its own [`AllocatorLog`] (for example one that also
//! increments metrics) without the engine depending on any particular
//! logging backend beyond its own default.

/// A logging sink. Each method takes an already-formatted message, mirroring
/// the shape the rest of this workspace's client code expects of its
/// ambient logger.
pub trait AllocatorLog: Send + Sync {
    /// Logs a trace-level message.
    fn trace(&self, message: &str);
    /// Logs a debug-level message.
    fn debug(&self, message: &str);
    /// Logs an info-level message.
    fn info(&self, message: &str);
    /// Logs a warning.
    fn warn(&self, message: &str);
    /// Logs an error.
    fn error(&self, message: &str);
}

/// The default [`AllocatorLog`], forwarding to `tracing`'s macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl AllocatorLog for TracingLog {
    fn trace(&self, message: &str) {
        tracing::trace!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

//! Injected observability for the moderation pipeline.
//!
//! Every stage reports through a `ModerationObserver` instead of calling the
//! global `tracing` macros directly, so tests can assert on what was reported.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ObservationLevel` values.
pub enum ObservationLevel {
    Debug,
    Info,
    Warn,
}

/// Trait contract for `ModerationObserver` behavior.
pub trait ModerationObserver: Send + Sync {
    fn observe(&self, level: ObservationLevel, stage: &'static str, message: &str);

    fn debug(&self, stage: &'static str, message: &str) {
        self.observe(ObservationLevel::Debug, stage, message);
    }

    fn info(&self, stage: &'static str, message: &str) {
        self.observe(ObservationLevel::Info, stage, message);
    }

    fn warn(&self, stage: &'static str, message: &str) {
        self.observe(ObservationLevel::Warn, stage, message);
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Forwards observations to `tracing` with a `stage` field.
pub struct TracingObserver;

impl ModerationObserver for TracingObserver {
    fn observe(&self, level: ObservationLevel, stage: &'static str, message: &str) {
        match level {
            ObservationLevel::Debug => tracing::debug!(stage, "{message}"),
            ObservationLevel::Info => tracing::info!(stage, "{message}"),
            ObservationLevel::Warn => tracing::warn!(stage, "{message}"),
        }
    }
}

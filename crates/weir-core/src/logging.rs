//! The logging seam: a minimal sink interface, ready-made sinks, and the
//! process-wide default.
//!
//! Guards talk to a [`LogSink`], never to a backend. The default sink
//! forwards to the standard [`log`] facade; tests swap in a [`CaptureSink`]
//! and assert on what was recorded.
//!
//! # Initialization
//!
//! No log implementation is included. Applications initialize their
//! preferred backend:
//!
//! ```ignore
//! env_logger::init();
//! ```
//!
//! # Log Targets
//!
//! Records published through the default [`FacadeSink`] carry a fixed
//! target, so backends can filter them:
//!
//! - `weir`: root target for this crate family
//! - `weir::guard`: scope-exit and handler-dispatch records
//!
//! Example filter: `RUST_LOG=weir::guard=debug`

use std::sync::{Arc, Mutex, OnceLock};

// Re-export the level type; it is part of the sink interface.
pub use log::Level;

/// Log targets used when publishing through the `log` facade.
pub mod targets {
    /// Root target for this crate family.
    pub const WEIR: &str = "weir";

    /// Scope-exit and handler-dispatch records.
    pub const GUARD: &str = "weir::guard";
}

/// Minimal logging collaborator: a severity and a preformatted message.
///
/// Implementations must tolerate calls from any thread; guards share sinks
/// freely and perform no locking of their own.
pub trait LogSink: Send + Sync {
    /// Publishes one record.
    fn log(&self, level: Level, message: &str);

    /// Whether records at `level` are worth formatting. Defaults to true;
    /// sinks backed by a filtering facade override this so callers can skip
    /// expensive rendering.
    fn enabled(&self, _level: Level) -> bool {
        true
    }
}

/// Forwards records to the [`log`] facade under a fixed target.
#[derive(Debug, Clone)]
pub struct FacadeSink {
    target: &'static str,
}

impl FacadeSink {
    /// A sink publishing under [`targets::GUARD`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: targets::GUARD,
        }
    }

    /// A sink publishing under a custom target.
    #[must_use]
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }

    /// The target this sink publishes under.
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
}

impl Default for FacadeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for FacadeSink {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: self.target, level, "{message}");
    }

    fn enabled(&self, level: Level) -> bool {
        log::log_enabled!(target: self.target, level)
    }
}

/// A sink that records every call for later assertions.
///
/// Built for tests: inject one into a guard, exercise the guard, then
/// assert on the captured records.
#[derive(Debug, Default)]
pub struct CaptureSink {
    records: Mutex<Vec<(Level, String)>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// The captured messages, oldest first, without levels.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .map(|records| records.iter().map(|(_, message)| message.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of captured records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any record's message contains `needle` (case-insensitive).
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.records
            .lock()
            .map(|records| {
                records
                    .iter()
                    .any(|(_, message)| message.to_lowercase().contains(&needle))
            })
            .unwrap_or(false)
    }

    /// Whether the records contain all of `needles`.
    #[must_use]
    pub fn contains_all(&self, needles: &[&str]) -> bool {
        needles.iter().all(|needle| self.contains(needle))
    }

    /// Asserts that some record contains `needle`.
    ///
    /// # Panics
    ///
    /// Panics if no record contains the needle.
    pub fn assert_contains(&self, needle: &str) {
        assert!(
            self.contains(needle),
            "no captured record contains '{}'. Captured records:\n{:#?}",
            needle,
            self.records()
        );
    }

    /// Asserts that no record contains `needle`.
    ///
    /// # Panics
    ///
    /// Panics if some record contains the needle.
    pub fn assert_not_contains(&self, needle: &str) {
        assert!(
            !self.contains(needle),
            "captured records unexpectedly contain '{}'. Captured records:\n{:#?}",
            needle,
            self.records()
        );
    }

    /// Asserts that nothing was captured.
    ///
    /// # Panics
    ///
    /// Panics if any record was captured.
    pub fn assert_empty(&self) {
        let records = self.records();
        assert!(
            records.is_empty(),
            "expected no captured records, got:\n{records:#?}"
        );
    }

    /// Drops all captured records.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl LogSink for CaptureSink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_string()));
        }
    }
}

/// A sink that discards everything, including the will to format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}

    fn enabled(&self, _level: Level) -> bool {
        false
    }
}

static DEFAULT_SINK: OnceLock<Arc<dyn LogSink>> = OnceLock::new();

/// The process-wide default sink, shared by every guard that does not carry
/// its own.
///
/// Created lazily on first use as a [`FacadeSink`]; replaceable beforehand
/// via [`init_default_sink`].
#[must_use]
pub fn default_sink() -> Arc<dyn LogSink> {
    DEFAULT_SINK
        .get_or_init(|| Arc::new(FacadeSink::new()))
        .clone()
}

/// Installs the process-wide default sink.
///
/// Must happen before any guard resolves the default; returns an error once
/// a default exists, whether installed or lazily created.
pub fn init_default_sink(sink: Arc<dyn LogSink>) -> Result<(), &'static str> {
    DEFAULT_SINK
        .set(sink)
        .map_err(|_| "default sink already initialized")
}

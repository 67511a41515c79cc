//! Rendering a failure's full trace: the cause chain plus any captured
//! backtrace, as one multi-line string.

use log::Level;

use crate::failure::Failure;
use crate::logging::LogSink;

/// Renders the failure, every link in its cause chain, and the backtrace
/// when one was captured.
///
/// One line per failure: the failure itself first, then a `caused by:` line
/// per cause, outermost to root. The backtrace section is appended last
/// under a `backtrace:` header.
#[must_use]
pub fn format_trace(failure: &Failure) -> String {
    let mut rendered = failure.to_string();
    for cause in failure.chain().skip(1) {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
    }
    if let Some(backtrace) = failure.backtrace() {
        rendered.push_str("\nbacktrace:\n");
        rendered.push_str(backtrace.to_string().trim_end());
    }
    rendered
}

/// Logs the rendered trace through `sink` at `level`.
///
/// Rendering is skipped entirely when the sink reports `level` disabled.
pub fn log_trace(failure: &Failure, sink: &dyn LogSink, level: Level) {
    if sink.enabled(level) {
        sink.log(level, &format_trace(failure));
    }
}

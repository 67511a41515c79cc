//! weir: a scoped failure-policy guard.
//!
//! A weir is a low barrier across a stream that decides what spills over
//! and what is contained. This crate does the same for failures: wrap a
//! block of work in a [`ScopeGuard`], declare which failure kinds must
//! always propagate (the do-not-resolve set), register handlers for the
//! kinds worth transforming, and let everything else be logged and
//! absorbed.
//!
//! ```
//! use weir::{Failure, ScopeGuard, kinds};
//!
//! let mut guard = ScopeGuard::<String>::builder()
//!     .dnr(&kinds::INTERRUPT)
//!     .handler(&kinds::NOT_FOUND, |f| Ok(format!("skipped: {}", f.message())))
//!     .build();
//!
//! let outcome = guard.run(|| {
//!     Err::<(), _>(Failure::new(&kinds::NOT_FOUND, "config file missing"))
//! });
//!
//! assert!(outcome.is_ok());
//! assert_eq!(
//!     guard.last_result().map(String::as_str),
//!     Some("skipped: config file missing"),
//! );
//! ```
//!
//! The pieces:
//!
//! - [`ScopeGuard`] and its [`GuardBuilder`]: the policy and the
//!   enter/exit protocol ([`guard`]);
//! - [`FailureKind`], [`kinds`], [`KindSet`]: the open failure taxonomy;
//! - [`Failure`]: failure values with cause chains and backtraces;
//! - [`LogSink`] and friends: the logging seam, defaulting to the
//!   process-wide [`log`](https://docs.rs/log) facade sink.
//!
//! Everything from `weir-core` is re-exported here; depending on `weir`
//! alone is enough.

#![forbid(unsafe_code)]

pub mod guard;

pub use guard::{Disposition, GuardBuilder, GuardState, ScopeGuard};
pub use weir_core::{
    Ancestors, CaptureSink, CauseChain, FacadeSink, Failure, FailureKind, Kind, KindSet, Level,
    LogSink, NullSink, ResultExt, default_sink, format_trace, init_default_sink, kinds, log_trace,
    targets,
};

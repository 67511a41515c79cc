//! Core building blocks for the `weir` scope guard.
//!
//! This crate carries everything a failure policy is made of, without the
//! guard itself:
//!
//! - [`kind`]: the failure-kind hierarchy ([`FailureKind`], [`KindSet`]) and
//!   the built-in taxonomy in [`kinds`];
//! - [`failure`]: [`Failure`] values with messages, cause chains, and
//!   backtraces, plus bridges from foreign error types;
//! - [`trace`]: rendering a failure's full trace as one string;
//! - [`logging`]: the minimal [`LogSink`] seam and the process-wide default.
//!
//! The guard lives in the `weir` crate, which re-exports all of this.

#![forbid(unsafe_code)]

pub mod failure;
pub mod kind;
pub mod logging;
pub mod trace;

pub use failure::{CauseChain, Failure, ResultExt};
pub use kind::{Ancestors, FailureKind, Kind, KindSet, kinds};
pub use logging::{
    CaptureSink, FacadeSink, Level, LogSink, NullSink, default_sink, init_default_sink, targets,
};
pub use trace::{format_trace, log_trace};

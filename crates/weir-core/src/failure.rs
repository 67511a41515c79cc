//! Failure values: a kind, a message, an optional cause chain, and an
//! optional captured backtrace.
//!
//! A [`Failure`] is the unit everything else in this workspace operates on.
//! It implements [`std::error::Error`], so it composes with `?` and with any
//! error-reporting machinery, and it is `Clone`, so one failure can be both
//! recorded and propagated.
//!
//! Foreign errors enter through [`Failure::from_error`], the [`ResultExt`]
//! adapter, or the `From` conversions for common std error types:
//!
//! ```
//! use weir_core::{Failure, ResultExt, kinds};
//!
//! let failure = "twelve".parse::<u32>().or_fail(&kinds::PARSE).unwrap_err();
//! assert!(failure.is_a(&kinds::FAILURE));
//! ```

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::kind::{FailureKind, Kind, kinds};

/// An instance of a [`FailureKind`]: the kind, a message, an optional chain
/// of causes, and an optional backtrace captured at construction.
///
/// Displays as `{kind}: {message}`. `source()` is the direct cause, so the
/// whole chain is visible to generic error reporters; [`chain`](Self::chain)
/// and [`root_cause`](Self::root_cause) walk it directly.
#[derive(Clone, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: Kind,
    message: String,
    #[source]
    caused_by: Option<Box<Failure>>,
    backtrace: Option<Arc<Backtrace>>,
}

impl Failure {
    /// Creates a failure of `kind` with `message`.
    ///
    /// A backtrace is captured when the process asks for one
    /// (`RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`), otherwise the failure stays
    /// lightweight.
    #[must_use]
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            caused_by: None,
            backtrace: capture_backtrace(),
        }
    }

    /// Creates a failure without attempting backtrace capture. Used for
    /// cause-chain links copied from foreign errors.
    fn bare(kind: Kind, message: String) -> Self {
        Self {
            kind,
            message,
            caused_by: None,
            backtrace: None,
        }
    }

    /// Wraps any [`std::error::Error`] as a failure of `kind`, copying the
    /// foreign `source()` chain into the cause chain.
    #[must_use]
    pub fn from_error(kind: Kind, err: &dyn StdError) -> Self {
        let mut failure = Self::new(kind, err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            failure.push_cause(Self::bare(&kinds::FAILURE, cause.to_string()));
            source = cause.source();
        }
        failure
    }

    /// The failure's kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The human-readable message, without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The direct cause, if any.
    #[must_use]
    pub fn caused_by(&self) -> Option<&Failure> {
        self.caused_by.as_deref()
    }

    /// The backtrace captured at construction, if one was.
    #[must_use]
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    /// Reflexive subtype test on the failure's kind.
    #[must_use]
    pub fn is_a(&self, kind: &FailureKind) -> bool {
        self.kind.is_a(kind)
    }

    /// Attaches `cause` at the end of the cause chain, so an existing root
    /// cause keeps its place and `cause` becomes the new root.
    #[must_use]
    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.push_cause(cause);
        self
    }

    fn push_cause(&mut self, cause: Failure) {
        if let Some(existing) = &mut self.caused_by {
            existing.push_cause(cause);
        } else {
            self.caused_by = Some(Box::new(cause));
        }
    }

    /// Iterates the failure and its causes, outermost first.
    pub fn chain(&self) -> CauseChain<'_> {
        CauseChain { next: Some(self) }
    }

    /// The innermost failure in the cause chain, or the failure itself when
    /// it has no cause.
    #[must_use]
    pub fn root_cause(&self) -> &Failure {
        let mut current = self;
        while let Some(cause) = current.caused_by() {
            current = cause;
        }
        current
    }

    /// The full rendered trace: this failure, every cause, and the
    /// backtrace when one was captured. See [`crate::trace::format_trace`].
    #[must_use]
    pub fn trace(&self) -> String {
        crate::trace::format_trace(self)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("caused_by", &self.caused_by)
            .field("backtrace", &self.backtrace.is_some())
            .finish()
    }
}

fn capture_backtrace() -> Option<Arc<Backtrace>> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(Arc::new(backtrace)),
        _ => None,
    }
}

/// Iterator over a failure and its causes, outermost first.
#[derive(Debug, Clone)]
pub struct CauseChain<'a> {
    next: Option<&'a Failure>,
}

impl<'a> Iterator for CauseChain<'a> {
    type Item = &'a Failure;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.caused_by();
        Some(current)
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => &kinds::NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => &kinds::PERMISSION_DENIED,
            std::io::ErrorKind::TimedOut => &kinds::TIMED_OUT,
            _ => &kinds::IO,
        };
        Self::from_error(kind, &err)
    }
}

impl From<std::num::ParseIntError> for Failure {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::from_error(&kinds::PARSE, &err)
    }
}

impl From<std::num::ParseFloatError> for Failure {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::from_error(&kinds::PARSE, &err)
    }
}

/// Converts foreign `Result`s into `Result<_, Failure>` under a chosen kind.
pub trait ResultExt<T> {
    /// Maps the error side to a [`Failure`] of `kind`, keeping the foreign
    /// error's message and source chain.
    fn or_fail(self, kind: Kind) -> Result<T, Failure>;

    /// Maps the error side to a [`Failure`] of `kind` with `message`; the
    /// foreign error becomes the cause.
    fn or_fail_with(self, kind: Kind, message: impl Into<String>) -> Result<T, Failure>;
}

impl<T, E: StdError> ResultExt<T> for Result<T, E> {
    fn or_fail(self, kind: Kind) -> Result<T, Failure> {
        self.map_err(|err| Failure::from_error(kind, &err))
    }

    fn or_fail_with(self, kind: Kind, message: impl Into<String>) -> Result<T, Failure> {
        self.map_err(|err| {
            Failure::new(kind, message).with_cause(Failure::from_error(&kinds::FAILURE, &err))
        })
    }
}

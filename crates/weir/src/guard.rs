//! The scope guard: wraps a block of work and applies a declarative failure
//! policy on the way out.
//!
//! A [`ScopeGuard`] is configured once (do-not-resolve kinds, handlers, a
//! fallback, a log sink) and then drives a two-phase protocol around a unit
//! of work. When the work fails, the guard logs the failure's trace,
//! dispatches it to a handler, and decides between suppressing the failure
//! and propagating it to the caller.
//!
//! Most callers use [`ScopeGuard::run`], which drives the protocol around a
//! closure; [`ScopeGuard::enter`] and [`ScopeGuard::exit`] are the protocol
//! itself, for callers integrating the guard into their own control flow.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use weir_core::logging::{Level, LogSink, default_sink};
use weir_core::trace::{format_trace, log_trace};
use weir_core::{Failure, Kind, KindSet, kinds};

type HandlerFn<R> = Box<dyn Fn(&Failure) -> Result<R, Failure> + Send + Sync>;

struct HandlerEntry<R> {
    name: Option<&'static str>,
    run: HandlerFn<R>,
}

impl<R> HandlerEntry<R> {
    fn label(&self) -> &'static str {
        self.name.unwrap_or("anonymous handler")
    }
}

/// What to do with a failure no registered handler matched.
enum Fallback<R> {
    /// Log the unhandled failure's trace at debug severity. The default.
    LogTrace,
    /// Run a caller-supplied handler.
    Handler(HandlerEntry<R>),
    /// Do nothing.
    None,
}

/// The caller's marching orders for the scope's failure, decided at exit.
#[must_use = "a disposition carries the propagation decision"]
#[derive(Debug)]
pub enum Disposition {
    /// The failure, if there was one, was resolved inside the scope.
    Suppress,
    /// The failure must continue up the caller's stack.
    Propagate(Failure),
}

impl Disposition {
    /// True when the scope's failure must continue outward.
    #[must_use]
    pub fn propagates(&self) -> bool {
        matches!(self, Self::Propagate(_))
    }

    /// Converts the decision into a caller-facing `Result`.
    pub fn into_result(self) -> Result<(), Failure> {
        match self {
            Self::Suppress => Ok(()),
            Self::Propagate(failure) => Err(failure),
        }
    }
}

/// Where a guard is in its entry/exit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Constructed, not yet entered.
    Idle,
    /// Inside a guarded scope.
    Active,
    /// The last scope finished without failure.
    ExitedClean,
    /// The last scope failed and the failure was resolved here.
    ExitedSuppressed,
    /// The last scope failed and the failure continued to the caller.
    ExitedPropagating,
}

/// Builder for [`ScopeGuard`].
///
/// Nothing is validated here; a misconfigured policy surfaces only when a
/// scope actually fails, never at construction.
pub struct GuardBuilder<R = ()> {
    dnr: KindSet,
    handlers: HashMap<Kind, HandlerEntry<R>>,
    fallback: Fallback<R>,
    sink: Option<Arc<dyn LogSink>>,
    subtype_handlers: bool,
}

impl<R> GuardBuilder<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dnr: KindSet::new(),
            handlers: HashMap::new(),
            fallback: Fallback::LogTrace,
            sink: None,
            subtype_handlers: false,
        }
    }

    /// Marks `kind` (and every kind descending from it) as do-not-resolve:
    /// such failures always propagate, handled or not.
    #[must_use]
    pub fn dnr(mut self, kind: Kind) -> Self {
        self.dnr.insert(kind);
        self
    }

    /// Marks every kind in `kinds` as do-not-resolve. Duplicates are
    /// tolerated and dropped; first-appearance order is kept.
    #[must_use]
    pub fn dnr_all<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = Kind>,
    {
        self.dnr.extend(kinds);
        self
    }

    /// Registers `handler` for failures of exactly `kind`.
    ///
    /// Lookup is by kind identity, not the is-a chain: a failure whose kind
    /// descends from `kind` does not match. See
    /// [`subtype_handlers`](Self::subtype_handlers) for the widening opt-in.
    /// Registering a second handler for the same kind replaces the first.
    #[must_use]
    pub fn handler<F>(self, kind: Kind, handler: F) -> Self
    where
        F: Fn(&Failure) -> Result<R, Failure> + Send + Sync + 'static,
    {
        self.insert_handler(kind, None, Box::new(handler))
    }

    /// Like [`handler`](Self::handler), with a name used in dispatch log
    /// lines.
    #[must_use]
    pub fn named_handler<F>(self, kind: Kind, name: &'static str, handler: F) -> Self
    where
        F: Fn(&Failure) -> Result<R, Failure> + Send + Sync + 'static,
    {
        self.insert_handler(kind, Some(name), Box::new(handler))
    }

    fn insert_handler(mut self, kind: Kind, name: Option<&'static str>, run: HandlerFn<R>) -> Self {
        self.handlers.insert(kind, HandlerEntry { name, run });
        self
    }

    /// Replaces the default unhandled-failure behavior (trace at debug)
    /// with `handler`, which runs exactly like a registered handler.
    #[must_use]
    pub fn fallback<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Failure) -> Result<R, Failure> + Send + Sync + 'static,
    {
        self.fallback = Fallback::Handler(HandlerEntry {
            name: Some("fallback handler"),
            run: Box::new(handler),
        });
        self
    }

    /// Disables the default unhandled-failure behavior entirely: on a
    /// lookup miss nothing runs and nothing extra is logged.
    #[must_use]
    pub fn no_fallback(mut self) -> Self {
        self.fallback = Fallback::None;
        self
    }

    /// Routes the guard's records through `sink` instead of the
    /// process-wide default.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Widens handler lookup from exact kind identity to
    /// nearest-registered-ancestor: a failure with no handler of its own
    /// falls to the closest ancestor kind that has one.
    #[must_use]
    pub fn subtype_handlers(mut self, enabled: bool) -> Self {
        self.subtype_handlers = enabled;
        self
    }

    /// Finishes configuration. Never fails.
    #[must_use]
    pub fn build(self) -> ScopeGuard<R> {
        ScopeGuard {
            dnr: self.dnr,
            handlers: self.handlers,
            fallback: self.fallback,
            sink: self.sink.unwrap_or_else(default_sink),
            subtype_handlers: self.subtype_handlers,
            state: GuardState::Idle,
            last_failure: None,
            last_result: None,
        }
    }
}

impl<R> Default for GuardBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoped failure-policy guard.
///
/// Wraps a block of work. When the block fails, the guard logs the
/// failure's full trace at debug severity, dispatches it to a registered
/// handler (exact kind match, else the fallback), and suppresses or
/// propagates it according to the do-not-resolve set. The handler's result
/// and the failure itself stay readable on the guard after the scope exits.
///
/// `R` is the handler result type, `()` when handlers only produce effects.
///
/// # Example
///
/// ```
/// use weir::{Failure, ScopeGuard, kinds};
///
/// let mut guard = ScopeGuard::<String>::builder()
///     .dnr(&kinds::INTERRUPT)
///     .handler(&kinds::TIMED_OUT, |f| Ok(format!("retry later: {}", f.message())))
///     .build();
///
/// let outcome = guard.run(|| {
///     Err::<(), _>(Failure::new(&kinds::TIMED_OUT, "upstream took 30s"))
/// });
///
/// assert!(outcome.is_ok());
/// assert_eq!(
///     guard.last_result().map(String::as_str),
///     Some("retry later: upstream took 30s"),
/// );
/// ```
pub struct ScopeGuard<R = ()> {
    dnr: KindSet,
    handlers: HashMap<Kind, HandlerEntry<R>>,
    fallback: Fallback<R>,
    sink: Arc<dyn LogSink>,
    subtype_handlers: bool,
    state: GuardState,
    last_failure: Option<Failure>,
    last_result: Option<R>,
}

impl ScopeGuard {
    /// A guard with nothing configured: every failure is logged and
    /// suppressed, the default fallback applies.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }
}

impl Default for ScopeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ScopeGuard<R> {
    /// Starts configuring a guard.
    #[must_use]
    pub fn builder() -> GuardBuilder<R> {
        GuardBuilder::new()
    }

    /// Opens a scope: clears the previous cycle's outcome and returns the
    /// guard as the scope handle. Entering again later begins a new cycle.
    pub fn enter(&mut self) -> &mut Self {
        self.last_failure = None;
        self.last_result = None;
        self.state = GuardState::Active;
        self
    }

    /// Closes the scope, applying the full policy to `failure`.
    ///
    /// With `None` this is a no-op clean exit. With a failure:
    ///
    /// 1. the failure's full trace is logged at debug severity,
    ///    unconditionally;
    /// 2. a handler is selected (exact kind lookup, else the fallback) and
    ///    run with the failure;
    /// 3. a failure returned by the handler becomes the propagation
    ///    payload, carrying the original at the end of its cause chain;
    /// 4. the do-not-resolve set decides, on the original failure's kind,
    ///    whether anything propagates.
    ///
    /// The original failure is recorded as
    /// [`last_failure`](Self::last_failure) before the decision is
    /// returned.
    pub fn exit(&mut self, failure: Option<Failure>) -> Disposition {
        let Some(original) = failure else {
            self.state = GuardState::ExitedClean;
            return Disposition::Suppress;
        };

        log_trace(&original, &*self.sink, Level::Debug);

        let superseding = self.dispatch(&original);

        let matched = self.dnr.matches(original.kind());
        self.last_failure = Some(original.clone());
        if matched {
            self.state = GuardState::ExitedPropagating;
            Disposition::Propagate(superseding.unwrap_or(original))
        } else {
            self.state = GuardState::ExitedSuppressed;
            Disposition::Suppress
        }
    }

    /// Selects and runs a handler for `failure`. Returns the superseding
    /// failure when the handler failed.
    fn dispatch(&mut self, failure: &Failure) -> Option<Failure> {
        let registered = if self.subtype_handlers {
            std::iter::once(failure.kind())
                .chain(failure.kind().ancestors())
                .find_map(|kind| self.handlers.get(&kind))
        } else {
            self.handlers.get(&failure.kind())
        };

        let entry = match (registered, &self.fallback) {
            (Some(entry), _) => entry,
            (None, Fallback::Handler(entry)) => entry,
            (None, Fallback::LogTrace) => {
                if self.sink.enabled(Level::Debug) {
                    self.sink.log(
                        Level::Debug,
                        &format!("unhandled failure\n{}", format_trace(failure)),
                    );
                }
                return None;
            }
            (None, Fallback::None) => return None,
        };

        self.sink.log(
            Level::Info,
            &format!("dispatching {} to {}", failure.kind(), entry.label()),
        );

        match (entry.run)(failure) {
            Ok(result) => {
                self.last_result = Some(result);
                None
            }
            Err(superseding) => Some(superseding.with_cause(failure.clone())),
        }
    }

    /// Runs `body` inside the scope, driving [`enter`](Self::enter) and
    /// [`exit`](Self::exit) around it.
    ///
    /// Returns `Ok(Some(value))` on clean completion, `Ok(None)` when a
    /// failure was suppressed (a handler result, if any, is in
    /// [`last_result`](Self::last_result)), and `Err` when the policy
    /// propagated.
    pub fn run<T>(
        &mut self,
        body: impl FnOnce() -> Result<T, Failure>,
    ) -> Result<Option<T>, Failure> {
        self.enter();
        match body() {
            Ok(value) => {
                let _ = self.exit(None);
                Ok(Some(value))
            }
            Err(failure) => match self.exit(Some(failure)) {
                Disposition::Suppress => Ok(None),
                Disposition::Propagate(failure) => Err(failure),
            },
        }
    }

    /// Like [`run`](Self::run), additionally containing panics: a panicking
    /// body becomes a failure of kind [`kinds::PANIC`] carrying the panic
    /// message, and flows through the normal exit policy.
    ///
    /// `PANIC` sits outside the `FAILURE` subtree, so a policy that marks
    /// `FAILURE` do-not-resolve still contains panics, and vice versa.
    pub fn run_caught<T>(
        &mut self,
        body: impl FnOnce() -> Result<T, Failure>,
    ) -> Result<Option<T>, Failure> {
        self.enter();
        let failure = match catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => {
                let _ = self.exit(None);
                return Ok(Some(value));
            }
            Ok(Err(failure)) => failure,
            Err(payload) => Failure::new(&kinds::PANIC, panic_message(&*payload)),
        };
        match self.exit(Some(failure)) {
            Disposition::Suppress => Ok(None),
            Disposition::Propagate(failure) => Err(failure),
        }
    }

    /// The failure recorded at the most recent exit, if that scope failed.
    /// Always the failure raised in the scope, not a handler's replacement.
    #[must_use]
    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    /// The most recent handler result, if a handler ran and returned one.
    #[must_use]
    pub fn last_result(&self) -> Option<&R> {
        self.last_result.as_ref()
    }

    /// Takes the most recent handler result, leaving `None` behind.
    pub fn take_last_result(&mut self) -> Option<R> {
        self.last_result.take()
    }

    /// Where the guard is in its entry/exit cycle.
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state
    }

    /// The configured do-not-resolve set.
    #[must_use]
    pub fn dnr(&self) -> &KindSet {
        &self.dnr
    }
}

impl<R> fmt::Debug for ScopeGuard<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("dnr", &self.dnr)
            .field("handlers", &self.handlers.len())
            .field("subtype_handlers", &self.subtype_handlers)
            .field("state", &self.state)
            .field("last_failure", &self.last_failure)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

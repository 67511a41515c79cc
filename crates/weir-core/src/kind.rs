//! Failure kinds and the is-a hierarchy.
//!
//! A [`FailureKind`] is a node in an open hierarchy of failure categories.
//! Kinds are declared as `static` items and handled by reference; two kinds
//! are the same kind only if they are the same `static` (pointer identity),
//! never because their display names happen to collide.
//!
//! The hierarchy is queried in two ways:
//!
//! - [`FailureKind::is_a`] walks the ancestor chain (reflexively), which is
//!   how do-not-resolve matching works;
//! - plain equality compares identity, which is how handler lookup works.
//!
//! A built-in taxonomy lives in [`kinds`]. Custom kinds parent onto any
//! existing kind:
//!
//! ```
//! use weir_core::{FailureKind, kinds};
//!
//! static DB_TIMEOUT: FailureKind = FailureKind::child_of("db_timeout", &kinds::TIMED_OUT);
//!
//! assert!(DB_TIMEOUT.is_a(&kinds::IO));
//! assert!(!DB_TIMEOUT.is_a(&kinds::ARITHMETIC));
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

/// Convenient shorthand for a kind handle: kinds are always passed by
/// `'static` reference.
pub type Kind = &'static FailureKind;

/// A node in the failure-kind hierarchy.
///
/// Declare kinds as `static` items via [`FailureKind::root`] or
/// [`FailureKind::child_of`]; the address of the `static` is the kind's
/// identity. Constructing a kind in a local variable is possible but
/// pointless: it will never compare equal to anything else.
pub struct FailureKind {
    name: &'static str,
    parent: Option<&'static FailureKind>,
}

impl FailureKind {
    /// Declares a kind with no parent (a hierarchy root).
    #[must_use]
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Declares a kind whose ancestor chain continues through `parent`.
    #[must_use]
    pub const fn child_of(name: &'static str, parent: &'static FailureKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// The display name. Purely informational; identity is the `static`
    /// address, not the name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The direct parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Kind> {
        self.parent
    }

    /// Walks the ancestor chain, excluding `self`, nearest first.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors { next: self.parent }
    }

    /// Reflexive subtype test: true if `ancestor` is this kind or appears
    /// anywhere in its ancestor chain.
    #[must_use]
    pub fn is_a(&self, ancestor: &FailureKind) -> bool {
        if std::ptr::eq(self, ancestor) {
            return true;
        }
        self.ancestors().any(|a| std::ptr::eq(a, ancestor))
    }
}

impl PartialEq for FailureKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for FailureKind {}

impl Hash for FailureKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FailureKind").field(&self.name).finish()
    }
}

/// Iterator over a kind's ancestor chain, nearest first.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<Kind>,
}

impl Iterator for Ancestors {
    type Item = Kind;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

/// An ordered, deduplicated collection of kinds.
///
/// Built from any iterable; duplicates are tolerated and dropped, first
/// appearance order is preserved. Two membership tests exist and they are
/// deliberately different: [`contains`](KindSet::contains) is exact
/// (identity), [`matches`](KindSet::matches) is the subtype test used for
/// do-not-resolve decisions.
#[derive(Debug, Clone, Default)]
pub struct KindSet {
    entries: Vec<Kind>,
}

impl KindSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a kind, returning false if it was already present.
    pub fn insert(&mut self, kind: Kind) -> bool {
        if self.contains(kind) {
            return false;
        }
        self.entries.push(kind);
        true
    }

    /// Exact membership: identity comparison only.
    #[must_use]
    pub fn contains(&self, kind: Kind) -> bool {
        self.entries.iter().any(|k| *k == kind)
    }

    /// Subtype membership: true if `kind` is, or descends from, any member.
    #[must_use]
    pub fn matches(&self, kind: Kind) -> bool {
        self.entries.iter().any(|k| kind.is_a(k))
    }

    /// Number of distinct kinds in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Kind> + '_ {
        self.entries.iter().copied()
    }
}

impl FromIterator<Kind> for KindSet {
    fn from_iter<I: IntoIterator<Item = Kind>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Kind> for KindSet {
    fn extend<I: IntoIterator<Item = Kind>>(&mut self, iter: I) {
        for kind in iter {
            self.insert(kind);
        }
    }
}

impl<const N: usize> From<[Kind; N]> for KindSet {
    fn from(kinds: [Kind; N]) -> Self {
        kinds.into_iter().collect()
    }
}

/// The built-in failure taxonomy.
///
/// `ANY` is the sole root. `FAILURE` is the root of ordinary failures;
/// `PANIC` and `INTERRUPT` hang off `ANY` directly, so a policy that names
/// `FAILURE` does not capture them. Everything else descends from `FAILURE`.
pub mod kinds {
    use super::FailureKind;

    /// Root of the whole taxonomy; every kind is-a `ANY`.
    pub static ANY: FailureKind = FailureKind::root("any");

    /// Root of ordinary failures.
    pub static FAILURE: FailureKind = FailureKind::child_of("failure", &ANY);

    /// A contained panic. Deliberately outside the `FAILURE` subtree.
    pub static PANIC: FailureKind = FailureKind::child_of("panic", &ANY);

    /// An operator- or peer-initiated break. Outside the `FAILURE` subtree.
    pub static INTERRUPT: FailureKind = FailureKind::child_of("interrupt", &ANY);

    /// An argument or operand with the right type but an unusable value.
    pub static VALUE: FailureKind = FailureKind::child_of("value", &FAILURE);

    /// Input that could not be parsed or decoded.
    pub static PARSE: FailureKind = FailureKind::child_of("parse", &FAILURE);

    /// A failure detected only at run time that fits no narrower kind.
    pub static RUNTIME: FailureKind = FailureKind::child_of("runtime", &FAILURE);

    /// A requested operation that is not implemented.
    pub static NOT_IMPLEMENTED: FailureKind =
        FailureKind::child_of("not_implemented", &RUNTIME);

    /// Arithmetic failures.
    pub static ARITHMETIC: FailureKind = FailureKind::child_of("arithmetic", &FAILURE);

    /// Division (or remainder) by zero.
    pub static DIVIDE_BY_ZERO: FailureKind =
        FailureKind::child_of("divide_by_zero", &ARITHMETIC);

    /// A result too large for its representation.
    pub static OVERFLOW: FailureKind = FailureKind::child_of("overflow", &ARITHMETIC);

    /// Lookup failures.
    pub static LOOKUP: FailureKind = FailureKind::child_of("lookup", &FAILURE);

    /// A missing map or dictionary key.
    pub static KEY_MISSING: FailureKind = FailureKind::child_of("key_missing", &LOOKUP);

    /// A sequence index outside the valid range.
    pub static INDEX_OUT_OF_RANGE: FailureKind =
        FailureKind::child_of("index_out_of_range", &LOOKUP);

    /// I/O failures.
    pub static IO: FailureKind = FailureKind::child_of("io", &FAILURE);

    /// A path or resource that does not exist.
    pub static NOT_FOUND: FailureKind = FailureKind::child_of("not_found", &IO);

    /// Insufficient permission for the attempted operation.
    pub static PERMISSION_DENIED: FailureKind =
        FailureKind::child_of("permission_denied", &IO);

    /// An operation that exceeded its deadline.
    pub static TIMED_OUT: FailureKind = FailureKind::child_of("timed_out", &IO);
}

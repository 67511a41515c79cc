//! End-to-end policy behavior: suppression, propagation, dispatch,
//! supersession, and outcome capture.

use std::collections::HashSet;
use std::sync::Arc;

use weir::{CaptureSink, Failure, GuardState, Kind, Level, NullSink, ScopeGuard, kinds};

#[test]
fn suppresses_unlisted_kinds_for_any_dnr_form() {
    fn check(mut guard: ScopeGuard) {
        let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::DIVIDE_BY_ZERO, "dont mind me")));
        assert!(matches!(outcome, Ok(None)));
        assert_eq!(guard.state(), GuardState::ExitedSuppressed);
    }

    let listed: [Kind; 3] = [&kinds::NOT_FOUND, &kinds::VALUE, &kinds::PARSE];

    check(ScopeGuard::new());
    check(ScopeGuard::builder().build());
    check(ScopeGuard::builder().dnr_all([]).build());
    check(ScopeGuard::builder().dnr_all(listed).build());
    check(ScopeGuard::builder().dnr_all(listed.to_vec()).build());
    check(ScopeGuard::builder().dnr_all(HashSet::from(listed)).build());
}

#[test]
fn propagates_exact_and_listed_kinds() {
    let cases: [(&[Kind], Kind); 3] = [
        (&[&kinds::VALUE], &kinds::VALUE),
        (&[&kinds::NOT_IMPLEMENTED, &kinds::VALUE], &kinds::VALUE),
        (&[&kinds::ARITHMETIC], &kinds::DIVIDE_BY_ZERO),
    ];

    for (dnr, raised) in cases {
        let mut guard: ScopeGuard = ScopeGuard::builder()
            .dnr_all(dnr.iter().copied())
            .sink(Arc::new(NullSink))
            .build();

        let failure = guard
            .run(|| Err::<(), _>(Failure::new(raised, "oops")))
            .unwrap_err();

        assert_eq!(failure.kind(), raised);
        assert_eq!(guard.state(), GuardState::ExitedPropagating);
        assert_eq!(guard.last_failure().map(Failure::kind), Some(raised));
    }
}

#[test]
fn propagates_subtypes_of_listed_parents() {
    let cases: [(Kind, Kind); 4] = [
        (&kinds::FAILURE, &kinds::VALUE),
        (&kinds::ARITHMETIC, &kinds::DIVIDE_BY_ZERO),
        (&kinds::ANY, &kinds::FAILURE),
        (&kinds::ANY, &kinds::INTERRUPT),
    ];

    for (parent, child) in cases {
        assert!(child.is_a(parent), "{child} does not descend from {parent}");

        let mut guard: ScopeGuard = ScopeGuard::builder()
            .dnr(parent)
            .sink(Arc::new(NullSink))
            .build();

        let failure = guard
            .run(|| Err::<(), _>(Failure::new(child, "propagate this")))
            .unwrap_err();

        assert_eq!(failure.kind(), child);
    }
}

#[test]
fn interrupts_are_not_ordinary_failures() {
    // A policy refusing to resolve ordinary failures still absorbs
    // interrupts; the two subtrees only meet at the root.
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::FAILURE)
        .sink(Arc::new(NullSink))
        .build();

    let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::INTERRUPT, "operator break")));
    assert!(matches!(outcome, Ok(None)));
}

#[test]
fn handler_failure_supersedes_the_propagating_failure() {
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::DIVIDE_BY_ZERO)
        .handler(&kinds::DIVIDE_BY_ZERO, |_| {
            Err(Failure::new(&kinds::RUNTIME, "handler gave up"))
        })
        .sink(Arc::new(NullSink))
        .build();

    let failure = guard
        .run(|| Err::<(), _>(Failure::new(&kinds::DIVIDE_BY_ZERO, "denominator is zero")))
        .unwrap_err();

    // The replacement propagates; the original rides along as its cause.
    assert_eq!(failure.kind(), &kinds::RUNTIME);
    assert_eq!(
        failure.caused_by().map(Failure::kind),
        Some(&kinds::DIVIDE_BY_ZERO)
    );
    assert_eq!(failure.root_cause().message(), "denominator is zero");

    // The guard records what the scope raised, not the replacement.
    assert_eq!(
        guard.last_failure().map(Failure::kind),
        Some(&kinds::DIVIDE_BY_ZERO)
    );
}

#[test]
fn superseding_failure_is_dropped_when_the_original_is_suppressed() {
    // No DNR entry for the raised kind: the original decides suppression
    // even when its handler raised a replacement.
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .handler(&kinds::VALUE, |_| {
            Err(Failure::new(&kinds::RUNTIME, "handler gave up"))
        })
        .sink(Arc::new(NullSink))
        .build();

    let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::VALUE, "oops")));

    assert!(matches!(outcome, Ok(None)));
    assert_eq!(guard.last_failure().map(Failure::kind), Some(&kinds::VALUE));
    assert_eq!(guard.state(), GuardState::ExitedSuppressed);
}

#[test]
fn handler_result_readable_after_suppression() {
    let mut guard = ScopeGuard::<String>::builder()
        .handler(&kinds::VALUE, |failure| Ok(failure.to_string()))
        .sink(Arc::new(NullSink))
        .build();

    let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::VALUE, "oops")));

    assert!(matches!(outcome, Ok(None)));
    assert_eq!(guard.last_result().map(String::as_str), Some("value: oops"));
}

#[test]
fn handler_result_survives_propagation() {
    let mut guard = ScopeGuard::<String>::builder()
        .dnr(&kinds::DIVIDE_BY_ZERO)
        .handler(&kinds::DIVIDE_BY_ZERO, |f| Ok(f.message().to_string()))
        .sink(Arc::new(NullSink))
        .build();

    let failure = guard
        .run(|| Err::<(), _>(Failure::new(&kinds::DIVIDE_BY_ZERO, "whoops")))
        .unwrap_err();

    assert_eq!(failure.kind(), &kinds::DIVIDE_BY_ZERO);
    assert_eq!(guard.last_result().map(String::as_str), Some("whoops"));
}

#[test]
fn clean_scope_leaves_no_trace() {
    let sink = Arc::new(CaptureSink::new());
    let mut guard: ScopeGuard = ScopeGuard::builder().sink(sink.clone()).build();

    let outcome = guard.run(|| Ok::<_, Failure>(7));

    assert_eq!(outcome.unwrap(), Some(7));
    assert!(guard.last_failure().is_none());
    assert!(guard.last_result().is_none());
    assert_eq!(guard.state(), GuardState::ExitedClean);
    sink.assert_empty();
}

#[test]
fn empty_builder_matches_new() {
    let mut by_new = ScopeGuard::new();
    let mut by_builder: ScopeGuard = ScopeGuard::builder().build();

    assert_eq!(by_new.state(), GuardState::Idle);
    assert_eq!(by_builder.state(), GuardState::Idle);
    assert!(by_new.dnr().is_empty());
    assert!(by_builder.dnr().is_empty());

    for guard in [&mut by_new, &mut by_builder] {
        let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::KEY_MISSING, "no such key")));
        assert!(matches!(outcome, Ok(None)));
        assert_eq!(guard.state(), GuardState::ExitedSuppressed);
        assert_eq!(
            guard.last_failure().map(Failure::kind),
            Some(&kinds::KEY_MISSING)
        );
    }
}

#[test]
fn handlers_match_exact_kind_only() {
    let mut guard = ScopeGuard::<String>::builder()
        .handler(&kinds::ARITHMETIC, |f| Ok(format!("caught {}", f.kind())))
        .sink(Arc::new(NullSink))
        .build();

    // A subtype of the registered kind does not reach the handler; the
    // failure is still suppressed.
    let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::DIVIDE_BY_ZERO, "n / 0")));
    assert!(matches!(outcome, Ok(None)));
    assert_eq!(guard.last_result(), None);

    // The exact kind does.
    let outcome = guard.run(|| Err::<(), _>(Failure::new(&kinds::ARITHMETIC, "bad math")));
    assert!(matches!(outcome, Ok(None)));
    assert_eq!(
        guard.last_result().map(String::as_str),
        Some("caught arithmetic")
    );
}

#[test]
fn subtype_lookup_finds_the_nearest_ancestor() {
    let mut guard = ScopeGuard::<String>::builder()
        .handler(&kinds::FAILURE, |_| Ok("failure handler".to_string()))
        .handler(&kinds::ARITHMETIC, |_| Ok("arithmetic handler".to_string()))
        .subtype_handlers(true)
        .sink(Arc::new(NullSink))
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::DIVIDE_BY_ZERO, "n / 0")));
    assert_eq!(
        guard.last_result().map(String::as_str),
        Some("arithmetic handler")
    );

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::KEY_MISSING, "no such key")));
    assert_eq!(
        guard.last_result().map(String::as_str),
        Some("failure handler")
    );
}

#[test]
fn subtype_lookup_still_prefers_the_exact_kind() {
    let mut guard = ScopeGuard::<String>::builder()
        .handler(&kinds::ARITHMETIC, |_| Ok("ancestor".to_string()))
        .handler(&kinds::DIVIDE_BY_ZERO, |_| Ok("own".to_string()))
        .subtype_handlers(true)
        .sink(Arc::new(NullSink))
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::DIVIDE_BY_ZERO, "n / 0")));
    assert_eq!(guard.last_result().map(String::as_str), Some("own"));
}

#[test]
fn failure_trace_is_logged_at_debug_even_when_propagating() {
    let sink = Arc::new(CaptureSink::new());
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::VALUE)
        .no_fallback()
        .sink(sink.clone())
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::VALUE, "bad input")));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Level::Debug);
    assert!(records[0].1.contains("value: bad input"));
}

#[test]
fn default_fallback_logs_unhandled_failures() {
    let sink = Arc::new(CaptureSink::new());
    let mut guard: ScopeGuard = ScopeGuard::builder().sink(sink.clone()).build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::PARSE, "bad header")));

    // One record for the exit trace, one for the unhandled-failure report.
    assert_eq!(sink.len(), 2);
    sink.assert_contains("unhandled failure");
    assert!(sink.records().iter().all(|(level, _)| *level == Level::Debug));
}

#[test]
fn no_fallback_skips_the_unhandled_record() {
    let sink = Arc::new(CaptureSink::new());
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .no_fallback()
        .sink(sink.clone())
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::PARSE, "bad header")));

    assert_eq!(sink.len(), 1);
    sink.assert_not_contains("unhandled failure");
}

#[test]
fn dispatch_line_names_the_handler() {
    let sink = Arc::new(CaptureSink::new());
    let mut guard = ScopeGuard::<String>::builder()
        .named_handler(&kinds::VALUE, "to_message", |f| Ok(f.to_string()))
        .sink(sink.clone())
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::VALUE, "oops")));

    sink.assert_contains("dispatching value to to_message");
    assert!(
        sink.records()
            .iter()
            .any(|(level, message)| *level == Level::Info && message.contains("to_message"))
    );
}

#[test]
fn anonymous_and_fallback_handlers_get_generic_labels() {
    let sink = Arc::new(CaptureSink::new());
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .handler(&kinds::VALUE, |_| Ok(()))
        .fallback(|_| Ok(()))
        .sink(sink.clone())
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::VALUE, "oops")));
    sink.assert_contains("dispatching value to anonymous handler");

    sink.clear();
    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::PARSE, "bad header")));
    sink.assert_contains("dispatching parse to fallback handler");
}

#[test]
fn manual_protocol_drives_the_same_policy() {
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::IO)
        .sink(Arc::new(NullSink))
        .build();

    guard.enter();
    let disposition = guard.exit(Some(Failure::new(&kinds::IO, "socket closed")));
    assert!(disposition.propagates());

    let failure = disposition.into_result().unwrap_err();
    assert_eq!(failure.kind(), &kinds::IO);
    assert_eq!(guard.state(), GuardState::ExitedPropagating);

    guard.enter();
    let disposition = guard.exit(None);
    assert!(!disposition.propagates());
    assert_eq!(guard.state(), GuardState::ExitedClean);
}

#[test]
fn reuse_overwrites_the_previous_outcome() {
    let mut guard = ScopeGuard::<String>::builder()
        .handler(&kinds::VALUE, |f| Ok(f.to_string()))
        .sink(Arc::new(NullSink))
        .build();

    let _ = guard.run(|| Err::<(), _>(Failure::new(&kinds::VALUE, "first failure")));
    assert!(guard.last_failure().is_some());
    assert!(guard.last_result().is_some());

    let outcome = guard.run(|| Ok::<_, Failure>("second run"));
    assert_eq!(outcome.unwrap(), Some("second run"));
    assert!(guard.last_failure().is_none());
    assert!(guard.last_result().is_none());
    assert_eq!(guard.state(), GuardState::ExitedClean);
}

#[test]
fn panics_are_contained_and_dispatched() {
    let mut guard = ScopeGuard::<String>::builder()
        .handler(&kinds::PANIC, |f| Ok(format!("contained: {}", f.message())))
        .sink(Arc::new(NullSink))
        .build();

    let outcome = guard.run_caught(|| -> Result<(), Failure> { panic!("widget exploded") });

    assert!(matches!(outcome, Ok(None)));
    assert_eq!(guard.last_failure().map(Failure::kind), Some(&kinds::PANIC));
    assert_eq!(
        guard.last_result().map(String::as_str),
        Some("contained: widget exploded")
    );
}

#[test]
fn panics_propagate_when_marked_dnr() {
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::PANIC)
        .sink(Arc::new(NullSink))
        .build();

    let failure = guard
        .run_caught(|| -> Result<(), Failure> { panic!("failed after {} retries", 3) })
        .unwrap_err();

    assert_eq!(failure.kind(), &kinds::PANIC);
    assert_eq!(failure.message(), "failed after 3 retries");
    assert_eq!(guard.state(), GuardState::ExitedPropagating);
}

#[test]
fn dnr_on_the_failure_subtree_does_not_cover_panics() {
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::FAILURE)
        .sink(Arc::new(NullSink))
        .build();

    let outcome = guard.run_caught(|| -> Result<(), Failure> { panic!("contained anyway") });
    assert!(matches!(outcome, Ok(None)));
    assert_eq!(guard.last_failure().map(Failure::kind), Some(&kinds::PANIC));
}

#[test]
fn run_caught_passes_ordinary_failures_through() {
    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::VALUE)
        .sink(Arc::new(NullSink))
        .build();

    let failure = guard
        .run_caught(|| Err::<(), _>(Failure::new(&kinds::VALUE, "oops")))
        .unwrap_err();

    assert_eq!(failure.kind(), &kinds::VALUE);
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    static ALL_KINDS: [Kind; 18] = [
        &kinds::ANY,
        &kinds::FAILURE,
        &kinds::PANIC,
        &kinds::INTERRUPT,
        &kinds::VALUE,
        &kinds::PARSE,
        &kinds::RUNTIME,
        &kinds::NOT_IMPLEMENTED,
        &kinds::ARITHMETIC,
        &kinds::DIVIDE_BY_ZERO,
        &kinds::OVERFLOW,
        &kinds::LOOKUP,
        &kinds::KEY_MISSING,
        &kinds::INDEX_OUT_OF_RANGE,
        &kinds::IO,
        &kinds::NOT_FOUND,
        &kinds::PERMISSION_DENIED,
        &kinds::TIMED_OUT,
    ];

    fn any_kind() -> impl Strategy<Value = Kind> {
        prop::sample::select(ALL_KINDS.to_vec())
    }

    fn kind_with_ancestor() -> impl Strategy<Value = (Kind, Kind)> {
        any_kind().prop_flat_map(|kind| {
            let lineage: Vec<Kind> = std::iter::once(kind).chain(kind.ancestors()).collect();
            (Just(kind), prop::sample::select(lineage))
        })
    }

    proptest! {
        #[test]
        fn empty_dnr_suppresses_every_kind(kind in any_kind()) {
            let mut guard: ScopeGuard = ScopeGuard::builder()
                .sink(Arc::new(NullSink))
                .build();

            let outcome = guard.run(|| Err::<(), _>(Failure::new(kind, "raised in scope")));

            prop_assert!(matches!(outcome, Ok(None)));
            prop_assert_eq!(guard.state(), GuardState::ExitedSuppressed);
        }

        #[test]
        fn dnr_membership_propagates_exactly(kind in any_kind()) {
            let mut guard: ScopeGuard = ScopeGuard::builder()
                .dnr(kind)
                .sink(Arc::new(NullSink))
                .build();

            let failure = guard
                .run(|| Err::<(), _>(Failure::new(kind, "raised in scope")))
                .unwrap_err();

            prop_assert_eq!(failure.kind(), kind);
            prop_assert_eq!(guard.last_failure().map(Failure::kind), Some(kind));
        }

        #[test]
        fn ancestors_in_dnr_propagate_descendants((kind, ancestor) in kind_with_ancestor()) {
            let mut guard: ScopeGuard = ScopeGuard::builder()
                .dnr(ancestor)
                .sink(Arc::new(NullSink))
                .build();

            let failure = guard
                .run(|| Err::<(), _>(Failure::new(kind, "raised in scope")))
                .unwrap_err();

            prop_assert_eq!(failure.kind(), kind);
        }
    }
}

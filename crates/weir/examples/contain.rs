//! Example: Containing per-record failures
//!
//! A small ingest loop that parses user-supplied records. Each record runs
//! inside a `ScopeGuard`, so one bad record never aborts the batch:
//! - parse failures reach a handler that substitutes a placeholder value
//! - validation failures have no handler and are simply suppressed
//! - the guard logs every unwind at debug severity
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --example contain
//! ```

use weir::{Failure, ResultExt, ScopeGuard, kinds};

fn parse_record(raw: &str) -> Result<i64, Failure> {
    let (_, value) = raw.split_once('=').ok_or_else(|| {
        Failure::new(&kinds::PARSE, format!("record {raw:?} has no '=' separator"))
    })?;
    let quantity = value.trim().parse::<i64>().or_fail(&kinds::PARSE)?;
    if quantity < 0 {
        return Err(Failure::new(
            &kinds::VALUE,
            format!("negative quantity {quantity} in {raw:?}"),
        ));
    }
    Ok(quantity)
}

fn main() {
    env_logger::init();

    let records = ["alpha = 3", "beta = twelve", "gamma = -2", "delta = 14"];

    let mut guard = ScopeGuard::<i64>::builder()
        .named_handler(&kinds::PARSE, "substitute_zero", |failure| {
            log::warn!("treating unparseable record as zero: {failure}");
            Ok(0)
        })
        .build();

    let mut total = 0;
    let mut ingested = 0;
    for raw in records {
        match guard.run(|| parse_record(raw)) {
            Ok(Some(quantity)) => {
                total += quantity;
                ingested += 1;
            }
            Ok(None) => match guard.take_last_result() {
                Some(substitute) => {
                    total += substitute;
                    ingested += 1;
                    println!("substituted {substitute} for {raw:?}");
                }
                None => {
                    if let Some(failure) = guard.last_failure() {
                        println!("skipped {raw:?}: {failure}");
                    }
                }
            },
            Err(failure) => unreachable!("no do-not-resolve kinds are configured: {failure}"),
        }
    }

    println!("ingested {ingested} of {} records, total = {total}", records.len());
}

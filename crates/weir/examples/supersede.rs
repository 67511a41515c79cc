//! Example: Do-not-resolve kinds and handler supersession
//!
//! A startup sequence with two guarded phases:
//! - cache warming may fail with `TIMED_OUT`; the kind is not marked, so the
//!   failure is contained and startup continues
//! - a missing config file is fatal: `NOT_FOUND` is marked do-not-resolve,
//!   and its handler raises a `RUNTIME` replacement so the caller sees a
//!   startup-shaped failure with the original cause still at the root
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --example supersede
//! ```

use weir::{Failure, ScopeGuard, kinds};

fn warm_cache() -> Result<usize, Failure> {
    Err(Failure::new(&kinds::TIMED_OUT, "upstream took more than 30s"))
}

fn load_config(path: &str) -> Result<String, Failure> {
    Err(Failure::new(&kinds::NOT_FOUND, format!("no such file: {path}")))
}

fn main() {
    env_logger::init();

    let mut guard: ScopeGuard = ScopeGuard::builder()
        .dnr(&kinds::NOT_FOUND)
        .named_handler(&kinds::NOT_FOUND, "startup_abort", |failure| {
            Err(Failure::new(
                &kinds::RUNTIME,
                format!("startup aborted: {}", failure.message()),
            ))
        })
        .build();

    match guard.run(warm_cache) {
        Ok(Some(entries)) => println!("cache warmed with {entries} entries"),
        Ok(None) => println!("cache warming failed, continuing cold"),
        Err(failure) => unreachable!("TIMED_OUT is not marked do-not-resolve: {failure}"),
    }

    match guard.run(|| load_config("/etc/app/settings.toml")) {
        Ok(Some(config)) => println!("loaded: {config}"),
        Ok(None) => println!("continuing without config"),
        Err(failure) => {
            eprintln!("fatal:\n{}", failure.trace());
            std::process::exit(1);
        }
    }
}

//! Log output setup.
//!
//! Every subsystem logs through `tracing` with its category as the target:
//!
//! | Target | Events |
//! |--------|--------|
//! | `archive` | template loads, alias precedence, skipped entries |
//! | `validate` | pre-check results |
//! | `render` | compile/render failures with template snippet + config keys |
//! | `export` | static builds, draft saves, inline asset extraction |
//! | `session` | edits, commits, preview refreshes |
//!
//! Output goes to stderr so stdout stays free for command output. `RUST_LOG`
//! overrides the configured level, e.g. `RUST_LOG=render=debug`.

use tracing_subscriber::EnvFilter;

/// Filter for `level`, unless `RUST_LOG` is set.
pub fn filter(level: &str) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Test logging, enabled only when `RUST_LOG` is set.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

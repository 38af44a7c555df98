//! Shared helpers for the behavioural suites.

/// Install a test subscriber once so `RUST_LOG=debug` surfaces the
/// services' recovery logging during a failing run.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

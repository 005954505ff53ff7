//! Shared helpers for the relhooks integration tests.

pub mod builders;
pub mod fake_executor;
pub mod probe;

use std::future::Future;

use tracing_subscriber::EnvFilter;

/// Route `tracing` output into the test harness.
///
/// Output only shows for failing tests (or with `--nocapture`). Filter with
/// `RUST_LOG`, e.g. `RUST_LOG=relhooks=debug`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Await `f`, failing the test if it takes longer than [`probe::LONG_WAIT`].
pub async fn with_timeout<F: Future>(f: F) -> F::Output {
    match tokio::time::timeout(probe::LONG_WAIT, f).await {
        Ok(out) => out,
        Err(_) => panic!("test timed out after {:?}", probe::LONG_WAIT),
    }
}

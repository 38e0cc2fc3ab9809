//! Shared fixtures for storydag integration tests.

pub mod builders;
pub mod fake_regenerator;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use storydag::logging::LOG_ENV_VAR;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Default budget for async tests; generous enough for debug builds.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise tracing for tests.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests (or with `-- --nocapture`). The filter comes from `STORYDAG_LOG`,
/// then `RUST_LOG`, then `warn`:
///
/// `STORYDAG_LOG=storydag::queue=debug cargo test --test regeneration_queue`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| EnvFilter::try_new(s).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn"));

        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Run a future under [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout_after(TEST_TIMEOUT, f).await
}

/// Run a future, panicking if it does not finish within `limit`.
pub async fn with_timeout_after<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {limit:?}"))
}

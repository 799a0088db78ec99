//! # Structured Logging
//!
//! Library code only emits `tracing` events; whoever embeds the vault
//! runtime installs the subscriber. Test suites use
//! [`try_init_test_logging`], which is safe to call from every test.
//!
//! `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=vaultline_contracts=trace`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TEST_FILTER: &str = "vaultline_contracts=debug,vaultline_protocol=debug";

/// Installs a test-writer subscriber if none is installed yet.
///
/// Returns `false` when a global subscriber already exists. Output goes
/// through libtest's capture, so it only shows for failing tests.
pub fn try_init_test_logging() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init()
        .is_ok()
}

//! Logging setup
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! caller's choice.

use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

/// Filter directive for a `-v` count
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "testbench=warn",
        1 => "testbench=info",
        2 => "testbench=debug",
        _ => "testbench=trace",
    }
}

/// Install a formatting subscriber
///
/// `RUST_LOG` wins over `verbosity` when set. Returns `false` when a global
/// subscriber was already installed, so calling it twice is harmless.
pub fn init(verbosity: u8) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}

/// Subscriber writing through the test harness's captured output
pub fn init_for_tests() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(2)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}

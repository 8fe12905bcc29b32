//! `tracing` subscriber setup shared by the watcher and the CLI.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global subscriber once; later calls are no-ops.
///
/// `RUST_LOG` wins over `default_directive`. Records emitted through the `log`
/// facade (the sync crate) are bridged into the same subscriber.
pub fn init_tracing(default_directive: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

//! Diagnostic logging through `tracing`.
//!
//! Logs go to stderr; stdout carries only the JSON results of `--check`,
//! `--execute`, and the other commands. The durable record of what happened
//! to each task is the audit log (`events`), which `RUST_LOG` does not affect.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset, by `-v` count.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "hostrelay=info",
        1 => "hostrelay=debug",
        _ => "hostrelay=trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set, e.g.
///
/// ```bash
/// RUST_LOG=hostrelay::executor=debug hostrelay run
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

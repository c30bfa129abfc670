//! Subscriber initialization: an `EnvFilter` defaulting to `info`, with a
//! plain or JSON formatter selectable at the command line.
//!
//! No OTLP exporter — there is no distributed system here to export spans
//! to — but the JSON-output flag is kept, since `status-all`/`replay-all`
//! benefit from machine-parseable logs when run in CI.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Initialize the global `tracing` subscriber. `json` selects
/// `tracing_subscriber::fmt::layer().json()` over the default human-readable
/// formatter; `RUST_LOG` (or `-v`/`-vv` translated by the caller into a
/// filter directive) controls verbosity, defaulting to `info`.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

//! Logging setup for the provider binary.
//!
//! All logs go to **stderr**: stdout carries the plugin handshake line and
//! must not be interleaved with anything else.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `signalfx_provider=debug`)
//!
//! ```bash
//! # Trace every API call the provider makes
//! RUST_LOG=signalfx_provider::client=debug ./signalfx-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the global subscriber, filtered by `RUST_LOG` (default `info`).
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_FILTER);
}

/// Like [`init_logging`], with a custom default used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning `false` if a subscriber is already set.
///
/// Safe to call from tests that may run in the same process.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

//! Tracing infrastructure for lfmq.
//!
//! Enable with `--features tracing`. All trace macros become no-ops when
//! the feature is disabled, so nothing is formatted or allocated on the
//! real-time thread in production builds.

/// Initialize the tracing subscriber with timestamps.
///
/// Call this at the start of tests or the benchmark binary to enable trace
/// output. The filter comes from `RUST_LOG` and defaults to `lfmq=trace`.
/// Does nothing if the `tracing` feature is not enabled.
///
/// Safe to call more than once, and from a host application that already
/// installed its own global subscriber: later calls leave the existing
/// subscriber in place.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lfmq=trace"));

    // An already-installed global subscriber wins.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

// When tracing is enabled, re-export macros from the tracing crate.
#[cfg(feature = "tracing")]
pub(crate) use tracing::debug;

// When tracing is disabled, provide no-op macro implementations.
#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
        debug!(attempt = 2, "still logging after repeated init");
    }
}

//! Logging utilities for covault.
//!
//! Re-exports the tracing macros used across the workspace and provides
//! subscriber initialization so binaries and tests configure output the same
//! way.

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};
pub use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for the global subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,
    /// Structured JSON, one event per line
    Json,
}

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, falling back to the given
/// default directive. Returns an error if a subscriber is already installed.
pub fn init(
    default_filter: &str,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().with_target(true).with_line_number(true).json())
            .try_init()?,
    }

    Ok(())
}

/// Initialize tracing for tests with output routed to the test writer.
///
/// Safe to call from every test; duplicate initialization is ignored.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_emit_after_init() {
        init_for_tests();
        info!("info event");
        debug!(operation = "demo", "debug event");
        warn!("warn event");
    }

    #[test]
    fn test_duplicate_test_init_is_harmless() {
        init_for_tests();
        init_for_tests();
    }
}

//! Logging utilities with segment prefixes.
//!
//! Provides consistent logging setup for objstore components.

#[cfg(feature = "subscriber")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with objstore defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format suitable for terminal output
#[cfg(feature = "subscriber")]
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// Does nothing if a global subscriber is already installed.
#[cfg(feature = "subscriber")]
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Segment prefixes for logging.
pub mod prefix {
    /// Database operations prefix
    pub const DB: &str = "⊔";
    /// Database open prefix
    pub const DB_OPEN: &str = "✿";
    /// Database close prefix
    pub const DB_CLOSE: &str = "❀";
}

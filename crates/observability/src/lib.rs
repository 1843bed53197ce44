//! Process-wide tracing setup shared by the binaries.

/// Initialize structured logging with the default `info` filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(DEFAULT_FILTER);
}

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Subscriber configuration (filters, JSON formatting).
pub mod tracing;

//! Process-wide tracing setup.

/// Initialize logging with `default_level` as the fallback filter.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(default_level: &str) {
    self::tracing::init(default_level);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

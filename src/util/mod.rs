//! Utility module
//!
//! Helpers shared across the crate: hex rendering of frames for log output
//! and tracing subscriber setup for binaries.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Renders bytes as contiguous lowercase hex without allocating
#[derive(Clone, Copy)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Lowercase hex string of `bytes`
pub fn hex(bytes: &[u8]) -> String {
    Hex(bytes).to_string()
}

/// Installs a fmt subscriber honouring `RUST_LOG`, falling back to `default_filter`
///
/// Calling it twice is harmless; the second call leaves the first subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

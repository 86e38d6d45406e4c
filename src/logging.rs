//! Internal logging bootstrap for kdcascade.
//!
//! This module initializes the `tracing` subscriber at startup when the crate is built with the
//! `setup_tracing` feature. The logging behavior is controlled by the `KDCASCADE_DEBUG`
//! environment variable. If `KDCASCADE_DEBUG` is not set or is set to a falsy value ("0",
//! "false", or empty), logging stays disabled. Otherwise, a debug-level subscriber is installed.

#[cfg(feature = "setup_tracing")]
use ctor::ctor;
#[cfg(feature = "setup_tracing")]
use tracing::Level;

#[cfg(feature = "setup_tracing")]
#[ctor]
fn set_debug_level() {
    if std::env::var("KDCASCADE_DEBUG").map_or(true, |v| v == "0" || v == "false" || v.is_empty())
    {
        // Leave logging disabled; `tracing` macros become no-ops without a subscriber.
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}

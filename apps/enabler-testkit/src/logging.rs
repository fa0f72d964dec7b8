//! Logging setup.

use tracing::Level;

/// Install the global `fmt` subscriber; call once from `main`.
///
/// Logs go to stderr so JSON output on stdout stays machine-readable.
pub fn init(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

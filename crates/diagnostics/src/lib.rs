//! Lightweight structured logging for the bridgefs workspace.
//!
//! Usage:
//! - Set BRIDGEFS_LOG=off (default) - no logs
//! - Set BRIDGEFS_LOG=info - operation-level logs
//! - Set BRIDGEFS_LOG=debug - detailed diagnostic logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on the BRIDGEFS_LOG environment variable.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var("BRIDGEFS_LOG").unwrap_or_else(|_| "off".to_string());

        let rt = match log_level.as_str() {
            "off" => return,
            "debug" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Debug))
                .init(),
            "info" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Info))
                .init(),
            "warn" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Warn))
                .init(),
            "error" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Error))
                .init(),
            _ => {
                let rt = emit::setup()
                    .emit_to(emit_term::stderr())
                    .emit_when(emit::level::min_filter(emit::Level::Info))
                    .init();
                eprintln!(
                    "Warning: Unknown BRIDGEFS_LOG value '{}', using 'info'",
                    log_level
                );
                rt
            }
        };

        // The emit runtime must live for the rest of the process.
        std::mem::forget(rt);
    });
}

/// Log operation-level events (opens, commits, renames, etc.)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (probe results, lock waits, internal state)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions (swallowed best-effort failures, fallbacks)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that surface to the caller
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

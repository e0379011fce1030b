//! Logging setup and compile-time gated probe logging.

/// Install an `env_logger` logger.
///
/// `RUST_LOG` wins when set; otherwise `debug` when verbose, `warn` if not.
/// Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .try_init()
        .ok();
}

/// Per-probe trace logging, compiled in only with the `probe_debug_logs`
/// feature.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments.
#[macro_export]
macro_rules! probe_debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "probe_debug_logs")]
        {
            log::trace!($($arg)*);
        }
        #[cfg(not(feature = "probe_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

//! Utilities: logging setup (level from -v/-q, RUST_LOG override, runtime
//! raise on VERBOSE).
//!
//! Key items:
//!   logging::init_logging / derive_level
//!   logging::enable_command_logs

/// Logging helpers on top of `tracing-subscriber`.
pub mod logging {
    use std::sync::OnceLock;

    use tracing::debug;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

    /// Name of the environment variable that turns on command logs.
    pub const VERBOSE_ENV: &str = "VERBOSE";

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    pub enum LogLevel {
        Error = 0,
        Info = 1,
        Debug = 2,
        Trace = 3,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }
    }

    pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
    static BASE_LEVEL: OnceLock<LogLevel> = OnceLock::new();

    fn filter_for(level: LogLevel) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    }

    /// Install the global subscriber (stderr). `RUST_LOG` wins over `level`.
    /// Calling it again is a no-op.
    pub fn init_logging(level: LogLevel) {
        if FILTER.get().is_some() {
            return;
        }
        let (layer, handle) = reload::Layer::new(filter_for(level));
        let installed = tracing_subscriber::registry()
            .with(layer)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init();
        if installed.is_ok() {
            let _ = FILTER.set(handle);
            let _ = BASE_LEVEL.set(level);
        }
    }

    /// Presence of `VERBOSE`, whatever its value.
    pub fn verbose_requested() -> bool {
        std::env::var_os(VERBOSE_ENV).is_some()
    }

    /// Raise the filter to debug if `VERBOSE` is set and the configured
    /// level is lower. An explicit `RUST_LOG` is left alone.
    pub fn enable_command_logs() {
        if !verbose_requested() || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let base = BASE_LEVEL.get().copied().unwrap_or(LogLevel::Info);
        if base >= LogLevel::Debug {
            return;
        }
        if let Some(handle) = FILTER.get() {
            match handle.reload(EnvFilter::new(LogLevel::Debug.as_str())) {
                Ok(()) => debug!("command logs enabled by {VERBOSE_ENV}"),
                Err(e) => eprintln!("cannot raise log level: {e}"),
            }
        }
    }

}

pub use logging::{derive_level, init_logging};

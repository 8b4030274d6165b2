//! Subscriber setup for binaries. The library itself only emits events.

use tracing_subscriber::{fmt, EnvFilter};

use crate::common::{Error, Result};

/// Install a global fmt subscriber filtered by `level`.
///
/// `level` is an `EnvFilter` directive such as `"info"` or
/// `"slotdb::index=debug"`. Events go to stderr so command output on stdout
/// stays clean.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| Error::InvalidConfig(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| Error::InvalidConfig("logging already initialized".into()))
}

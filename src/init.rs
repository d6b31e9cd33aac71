use crate::env::{env_flag, ENABLE_STDOUT_ENV};
use crate::layer::RecordLayer;
use crate::logger::{default_logger, Logger};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global `tracing` subscriber installed by
/// [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: when `true`, a `tracing_subscriber::fmt` layer is added
///   next to [`RecordLayer`] so events are also printed to stdout in the
///   human-readable format.
#[derive(Clone, Debug, Default)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

impl LayerConfig {
    /// Read `CTX_LOG_ENABLE_STDOUT`.
    pub fn from_env() -> Self {
        Self {
            enable_stdout: env_flag(ENABLE_STDOUT_ENV),
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install a global `tracing` subscriber that forwards every event to
/// `logger` as a structured record.
///
/// **Returns**
/// - `Ok(())` once the subscriber is the process-wide default.
/// - `Err(InitError::AlreadyInstalled)` if another subscriber was set first.
pub fn init_tracing_with_config(logger: Logger, config: LayerConfig) -> Result<(), InitError> {
    let layer = RecordLayer::new(logger);

    // Both branches build a different subscriber type, so each installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Forward `tracing` events to `logger` with the default [`LayerConfig`].
pub fn init_tracing(logger: Logger) -> Result<(), InitError> {
    init_tracing_with_config(logger, LayerConfig::default())
}

/// Forward `tracing` events to the process-wide logger, configured from the
/// environment.
pub fn init_default() -> Result<(), InitError> {
    init_tracing_with_config(default_logger().clone(), LayerConfig::from_env())
}

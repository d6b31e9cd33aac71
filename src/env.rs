//! Environment variable names read by this crate's configuration helpers.
//!
//! These are purely helpers; loggers and the middleware can always be
//! configured directly in code.

/// Response header the middleware writes the correlation id to.
pub const REQUEST_ID_HEADER_ENV: &str = "CTX_LOG_REQUEST_ID_HEADER";

/// Number of request/response body bytes the middleware logs.
pub const PREVIEW_LIMIT_ENV: &str = "CTX_LOG_PREVIEW_LIMIT";

/// When set to `1` or `true`, [`crate::init::LayerConfig::from_env`] also
/// prints tracing events to stdout.
pub const ENABLE_STDOUT_ENV: &str = "CTX_LOG_ENABLE_STDOUT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Interpret an environment variable as a boolean flag.
pub fn env_flag(key: &str) -> bool {
    matches!(
        env_or(key, "").trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

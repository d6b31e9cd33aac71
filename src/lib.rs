//! Structured JSON-lines logging with request correlation.
//!
//! Every log call produces one line of JSON carrying a timestamp, level,
//! correlation id, call site and a structured description of each logged
//! value, including the output of any registered converters:
//!
//! ```text
//! {"Time":"...","Level":"info","RequestID":"","Message":"data","Source":{...},"Data":[...]}
//! ```
//!
//! ```
//! use ctx_log::{Context, Logger};
//!
//! let logger = Logger::new(std::io::stderr());
//! let ctx = Context::background().with_request_id("abc");
//! logger.info(&ctx, &"user signed in");
//! ctx_log::error!(logger: logger, &ctx, "lookup failed", 404, "users");
//! ```
//!
//! Method and function entry points find the caller's function name by
//! walking the stack once per record. The `info!`, `error!` and `log!`
//! macros resolve it at compile time instead, which makes them the cheaper
//! choice on hot paths. Release builds without line tables still report the
//! function name.
//!
//! With the `middleware` feature, [`RequestLogLayer`] logs every HTTP request
//! and response passing through an axum router.

pub mod context;
pub mod converter;
pub mod env;
pub mod init;
pub mod layer;
pub mod logger;
mod marshal;
pub mod record;
pub mod serialize;
pub mod sink;
pub mod source;

#[cfg(feature = "middleware")]
pub mod body;
#[cfg(feature = "middleware")]
pub mod middleware;

pub use context::{get_request_id, Context, RequestId};
pub use converter::{ConvertError, ConverterRegistry};
pub use logger::{
    default_logger, error, info, log, new_logger, register_converter, set_output, with_context,
    writer, ContextLogger, LevelWriter, Logger,
};
pub use record::{DataItem, ErrorValue, Level, LogRecord, Loggable, SourceLocation};
pub use sink::Sink;
pub use source::capture_call_site;

#[cfg(feature = "middleware")]
pub use middleware::{middleware, MiddlewareConfig, RequestLogLayer, RequestLogService};

use crate::context::Context;
use crate::converter::{ConvertError, ConverterRegistry};
use crate::record::{Level, LogRecord, Loggable, SourceLocation};
use crate::serialize::encode;
use crate::sink::Sink;
use crate::source::capture_call_site;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::sync::{Arc, OnceLock};

static DEFAULT_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Structured logger writing one JSON line per call to its [`Sink`].
///
/// Clones share the sink and the converter registry.
#[derive(Clone, Debug)]
pub struct Logger {
    sink: Arc<Sink>,
    converters: Arc<ConverterRegistry>,
}

impl Logger {
    /// Logger bound to `writer`, with its own empty converter registry.
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Logger {
            sink: Arc::new(Sink::new(writer)),
            converters: Arc::new(ConverterRegistry::new()),
        }
    }

    /// Share `converters` with other loggers instead of the private registry.
    pub fn with_converters(mut self, converters: Arc<ConverterRegistry>) -> Self {
        self.converters = converters;
        self
    }

    pub fn converters(&self) -> &Arc<ConverterRegistry> {
        &self.converters
    }

    pub fn register_converter<F>(&self, name: impl Into<String>, convert: F)
    where
        F: Fn(&dyn Any) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    {
        self.converters.register(name, convert);
    }

    pub fn set_output<W: Write + Send + 'static>(&self, writer: W) {
        self.sink.set_output(writer);
    }

    #[inline(never)]
    #[track_caller]
    pub fn info(&self, ctx: &Context, value: &dyn Loggable) {
        self.log(Level::Info, ctx, value, &[]);
    }

    #[inline(never)]
    #[track_caller]
    pub fn error(&self, ctx: &Context, value: &dyn Loggable) {
        self.log(Level::Error, ctx, value, &[]);
    }

    /// Log `value` followed by `extra` at `level`, attributed to the caller.
    #[inline(never)]
    #[track_caller]
    pub fn log(&self, level: Level, ctx: &Context, value: &dyn Loggable, extra: &[&dyn Loggable]) {
        let source = capture_call_site(Location::caller());
        self.log_at(level, ctx, source, value, extra);
    }

    /// Log with an already resolved call site. Used by the macros and by
    /// integrations that know their own source location.
    pub fn log_at(
        &self,
        level: Level,
        ctx: &Context,
        source: SourceLocation,
        value: &dyn Loggable,
        extra: &[&dyn Loggable],
    ) {
        let record = LogRecord::build(level, ctx, source, value, extra, &self.converters);
        let line = encode(record, &self.converters);
        if let Err(e) = self.sink.write(&line) {
            let _ = writeln!(io::stderr(), "ctx-log: failed to write log record: {}", e);
        }
    }

    /// Logger that supplies `ctx` to every call.
    pub fn with_context(&self, ctx: Context) -> ContextLogger {
        ContextLogger {
            logger: self.clone(),
            ctx,
        }
    }

    /// `io::Write` adapter logging every write as one record at `level`.
    pub fn writer(&self, level: Level) -> LevelWriter {
        LevelWriter {
            level,
            logger: self.clone(),
        }
    }
}

/// A [`Logger`] bound to a [`Context`].
#[derive(Clone, Debug)]
pub struct ContextLogger {
    logger: Logger,
    ctx: Context,
}

impl ContextLogger {
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[inline(never)]
    #[track_caller]
    pub fn info(&self, value: &dyn Loggable) {
        self.logger.log(Level::Info, &self.ctx, value, &[]);
    }

    #[inline(never)]
    #[track_caller]
    pub fn error(&self, value: &dyn Loggable) {
        self.logger.log(Level::Error, &self.ctx, value, &[]);
    }

    #[inline(never)]
    #[track_caller]
    pub fn log(&self, level: Level, value: &dyn Loggable, extra: &[&dyn Loggable]) {
        self.logger.log(level, &self.ctx, value, extra);
    }
}

/// Byte sink that logs whatever is written to it as a record's message.
///
/// Bytes are decoded lossily as UTF-8. Each `write`, `write_all` or
/// `write_fmt` call produces exactly one record.
#[derive(Clone, Debug)]
pub struct LevelWriter {
    level: Level,
    logger: Logger,
}

impl LevelWriter {
    #[inline(never)]
    #[track_caller]
    fn emit(&self, buf: &[u8]) {
        let message = String::from_utf8_lossy(buf).into_owned();
        self.logger.log(self.level, &Context::background(), &message, &[]);
    }
}

impl Write for LevelWriter {
    #[inline(never)]
    #[track_caller]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.emit(buf);
        Ok(buf.len())
    }

    #[inline(never)]
    #[track_caller]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.emit(buf);
        Ok(())
    }

    #[inline(never)]
    #[track_caller]
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.emit(fmt::format(args).as_bytes());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The process-wide logger, writing to standard error until redirected with
/// [`set_output`].
pub fn default_logger() -> &'static Logger {
    DEFAULT_LOGGER.get_or_init(|| Logger {
        sink: Arc::new(Sink::stderr()),
        converters: Arc::new(ConverterRegistry::new()),
    })
}

/// Independent logger bound to `writer`.
pub fn new_logger<W: Write + Send + 'static>(writer: W) -> Logger {
    Logger::new(writer)
}

#[inline(never)]
#[track_caller]
pub fn info(ctx: &Context, value: &dyn Loggable) {
    default_logger().log(Level::Info, ctx, value, &[]);
}

#[inline(never)]
#[track_caller]
pub fn error(ctx: &Context, value: &dyn Loggable) {
    default_logger().log(Level::Error, ctx, value, &[]);
}

#[inline(never)]
#[track_caller]
pub fn log(level: Level, ctx: &Context, value: &dyn Loggable, extra: &[&dyn Loggable]) {
    default_logger().log(level, ctx, value, extra);
}

pub fn set_output<W: Write + Send + 'static>(writer: W) {
    default_logger().set_output(writer);
}

pub fn writer(level: Level) -> LevelWriter {
    default_logger().writer(level)
}

pub fn with_context(ctx: Context) -> ContextLogger {
    default_logger().with_context(ctx)
}

/// Register a converter on the process-wide logger.
pub fn register_converter<F>(name: impl Into<String>, convert: F)
where
    F: Fn(&dyn Any) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
{
    default_logger().register_converter(name, convert);
}

/// Log at info level with any number of extra values.
///
/// ```
/// use ctx_log::{info, Context, Logger};
///
/// let ctx = Context::background();
/// info!(&ctx, "user signed in", 42, "admin");
///
/// let logger = Logger::new(std::io::sink());
/// info!(logger: logger, &ctx, "to a specific logger");
/// ```
#[macro_export]
macro_rules! info {
    (logger: $logger:expr, $ctx:expr, $value:expr $(, $extra:expr)* $(,)?) => {
        $crate::log!(logger: $logger, $crate::Level::Info, $ctx, $value $(, $extra)*)
    };
    ($ctx:expr, $value:expr $(, $extra:expr)* $(,)?) => {
        $crate::log!($crate::Level::Info, $ctx, $value $(, $extra)*)
    };
}

/// Log at error level with any number of extra values.
#[macro_export]
macro_rules! error {
    (logger: $logger:expr, $ctx:expr, $value:expr $(, $extra:expr)* $(,)?) => {
        $crate::log!(logger: $logger, $crate::Level::Error, $ctx, $value $(, $extra)*)
    };
    ($ctx:expr, $value:expr $(, $extra:expr)* $(,)?) => {
        $crate::log!($crate::Level::Error, $ctx, $value $(, $extra)*)
    };
}

/// Log at an explicit level with any number of extra values.
#[macro_export]
macro_rules! log {
    (logger: $logger:expr, $level:expr, $ctx:expr, $value:expr $(, $extra:expr)* $(,)?) => {
        ($logger).log_at(
            $level,
            $ctx,
            $crate::call_site!(),
            &$value,
            &[$(&$extra as &dyn $crate::Loggable),*],
        )
    };
    ($level:expr, $ctx:expr, $value:expr $(, $extra:expr)* $(,)?) => {
        $crate::log!(logger: $crate::default_logger(), $level, $ctx, $value $(, $extra)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn records(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[test]
    fn each_call_writes_one_line() {
        let out = Shared::default();
        let logger = Logger::new(out.clone());
        let ctx = Context::background();

        logger.info(&ctx, &"one");
        logger.error(&ctx, &2);
        logger.log(Level::Unknown, &ctx, &"three", &[&3.5]);

        let records = out.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["Level"], "info");
        assert_eq!(records[1]["Level"], "error");
        assert_eq!(records[2]["Level"], "unknown");
        assert_eq!(records[2]["Data"][1]["Marshaled"], json!(3.5));
    }

    #[test]
    fn context_logger_carries_request_id() {
        let out = Shared::default();
        let logger = Logger::new(out.clone());
        let bound = logger.with_context(Context::background().with_request_id("req-1"));

        bound.info(&"hello");
        bound.log(Level::Error, &"bye", &[&"extra"]);

        let records = out.records();
        assert!(records.iter().all(|r| r["RequestID"] == "req-1"));
        assert_eq!(records[1]["Data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn writer_logs_bytes_as_message() {
        let out = Shared::default();
        let logger = Logger::new(out.clone());
        let mut writer = logger.writer(Level::Unknown);

        writer.write_all(b"data").unwrap();
        assert_eq!(writer.write(b"more").unwrap(), 4);

        let records = out.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Message"], "data");
        assert_eq!(records[0]["Level"], "unknown");
        assert_eq!(records[0]["Data"][0]["Type"], "string");
    }

    #[test]
    fn macros_accept_variadic_extras() {
        let out = Shared::default();
        let logger = Logger::new(out.clone());
        let ctx = Context::background();

        crate::info!(logger: logger, &ctx, "data", 1, "two", vec![3]);
        crate::error!(logger: &logger, &ctx, "failed",);

        let records = out.records();
        assert_eq!(records[0]["Data"].as_array().unwrap().len(), 4);
        assert_eq!(records[0]["Data"][3]["Marshaled"], json!([3]));
        assert_eq!(records[1]["Level"], "error");
        assert_eq!(
            records[1]["Source"]["FunctionName"],
            "ctx_log::logger::tests::macros_accept_variadic_extras"
        );
    }

    #[test]
    fn loggers_have_separate_converters_unless_shared() {
        let out = Shared::default();
        let registry = Arc::new(ConverterRegistry::new());
        registry.register("upper", |v: &dyn Any| {
            Ok(v.downcast_ref::<&str>().map(|s| json!(s.to_uppercase())))
        });
        let shared = Logger::new(out.clone()).with_converters(Arc::clone(&registry));
        let private = Logger::new(out.clone());
        let ctx = Context::background();

        shared.info(&ctx, &"abc");
        private.info(&ctx, &"abc");

        let records = out.records();
        assert_eq!(records[0]["Data"][0]["Converted"]["upper"], "ABC");
        assert_eq!(records[1]["Data"][0]["Converted"], json!({}));
    }
}

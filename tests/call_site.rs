mod common;

use common::{function_name, SharedBuffer};
use ctx_log::{Context, Level, Logger};
use serde_json::Value;
use std::io::Write;

fn only_record(out: &SharedBuffer) -> Value {
    let mut records = out.records();
    assert_eq!(records.len(), 1);
    records.remove(0)
}

fn assert_source(record: &Value, line: u32, function: &str) {
    assert_eq!(record["Source"]["FilePath"], file!());
    assert_eq!(record["Source"]["LineNumber"], line);
    let name = function_name(record);
    assert!(name.contains(function), "{name} does not name {function}");
}

#[test]
fn logger_method_reports_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());

    logger.info(&Context::background(), &"data");
    let line = line!() - 1;

    assert_source(&only_record(&out), line, "logger_method_reports_caller");
}

#[test]
fn log_method_reports_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());

    logger.log(Level::Warn, &Context::background(), &"data", &[&1]);
    let line = line!() - 1;

    assert_source(&only_record(&out), line, "log_method_reports_caller");
}

#[test]
fn macro_reports_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());

    ctx_log::error!(logger: logger, &Context::background(), "data", 1, 2.5);
    let line = line!() - 1;

    let record = only_record(&out);
    assert_source(&record, line, "macro_reports_caller");
    assert_eq!(record["Data"].as_array().unwrap().len(), 3);
}

#[test]
fn context_logger_reports_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());
    let scoped = logger.with_context(Context::background().with_request_id("abc"));

    scoped.info(&"data");
    let line = line!() - 1;

    let record = only_record(&out);
    assert_source(&record, line, "context_logger_reports_caller");
    assert_eq!(record["RequestID"], "abc");
}

#[test]
fn writer_write_all_reports_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());
    let mut writer = logger.writer(Level::Info);

    writer.write_all(b"data").unwrap();
    let line = line!() - 1;

    assert_source(&only_record(&out), line, "writer_write_all_reports_caller");
}

#[test]
fn writeln_reports_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());
    let mut writer = logger.writer(Level::Error);

    writeln!(writer, "data {}", 1).unwrap();
    let line = line!() - 1;

    assert_source(&only_record(&out), line, "writeln_reports_caller");
}

#[inline(never)]
fn log_from_helper(logger: &Logger) -> u32 {
    logger.info(&Context::background(), &"from helper");
    line!() - 1
}

#[test]
fn helper_function_is_reported_not_its_caller() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());

    let line = log_from_helper(&logger);

    let record = only_record(&out);
    assert_source(&record, line, "log_from_helper");
    assert!(!function_name(&record).contains("helper_function_is_reported"));
}

#[test]
fn closures_are_attributed_to_their_enclosing_function() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());

    let log = || {
        logger.info(&Context::background(), &"from closure");
        line!() - 1
    };
    let line = log();

    assert_source(&only_record(&out), line, "closures_are_attributed_to_their_enclosing_function");
}

#[inline(never)]
fn write_from_helper(writer: &mut ctx_log::LevelWriter) -> u32 {
    writer.write_all(b"from helper").unwrap();
    line!() - 1
}

#[test]
fn helper_using_writer_is_reported() {
    let out = SharedBuffer::new();
    let logger = Logger::new(out.clone());
    let mut writer = logger.writer(Level::Info);

    let line = write_from_helper(&mut writer);

    assert_source(&only_record(&out), line, "write_from_helper");
}

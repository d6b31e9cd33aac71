//! The process-wide logger is shared state, so everything touching it lives
//! in this single test.

mod common;

use common::{function_name, SharedBuffer};
use ctx_log::{Context, Level};
use serde_json::json;
use std::any::Any;
use std::io::Write;

#[tokio::test]
async fn default_logger_entry_points() {
    let out = SharedBuffer::new();
    ctx_log::set_output(out.clone());

    ctx_log::info(&Context::background(), &"data");
    let line = line!() - 1;
    let record = &out.records()[0];
    assert_eq!(record["Level"], "info");
    assert_eq!(record["RequestID"], "");
    assert_eq!(
        record["Data"],
        json!([{"Type": "string", "Marshaled": "data", "Printed": "\"data\"", "Converted": {}}])
    );
    assert_eq!(record["Source"]["LineNumber"], line);
    assert!(function_name(record).contains("default_logger_entry_points"));
    out.clear();

    ctx_log::register_converter("myconverter", |value: &dyn Any| {
        Ok(value.downcast_ref::<&str>().map(|s| json!(format!("123{s}"))))
    });
    ctx_log::error!(&Context::background(), "data", 1);
    let record = &out.records()[0];
    assert_eq!(record["Level"], "error");
    assert_eq!(record["Data"][0]["Converted"]["myconverter"], "123data");
    assert_eq!(record["Data"][1]["Converted"], json!({}));
    out.clear();

    let scoped = ctx_log::with_context(Context::background().with_request_id("abc"));
    scoped.error(&"scoped");
    let mut writer = ctx_log::writer(Level::Warn);
    writer.write_all(b"from writer").unwrap();
    ctx_log::log(Level::Debug, &Context::background(), &"leveled", &[]);
    let records = out.records();
    assert_eq!(records[0]["RequestID"], "abc");
    assert_eq!(records[1]["Level"], "warn");
    assert_eq!(records[1]["Message"], "from writer");
    assert_eq!(records[2]["Level"], "debug");
    assert_eq!(ctx_log::get_request_id(scoped.context()), "abc");
    out.clear();

    let loggers_share_registry = ctx_log::new_logger(std::io::sink());
    assert_eq!(loggers_share_registry.converters().len(), 0);
    assert_eq!(ctx_log::default_logger().converters().len(), 1);

    #[cfg(feature = "middleware")]
    {
        use axum::body::Body;
        use axum::extract::Request;
        use axum::routing::get;
        use axum::Router;
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        let service = ctx_log::middleware(Router::new().route("/", get(|| async { "ok" })));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = service.oneshot(request).await.unwrap();
        response.into_body().collect().await.unwrap();

        let records = out.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Message"], "request started");
        assert_eq!(records[1]["Message"], "request finished");
    }
}

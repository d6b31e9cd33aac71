use std::any::Any;
use std::time::Duration;

use ctx_log::{Context, ErrorValue};
use serde::Serialize;
use serde_json::json;

/// Example of enriching every record with converter output. Each converter
/// sees every logged value and decides for itself whether it applies.
#[derive(Debug, Serialize)]
struct Order {
    id: u64,
    total_cents: u64,
}

fn main() {
    ctx_log::register_converter("dollars", |value: &dyn Any| {
        Ok(value
            .downcast_ref::<Order>()
            .map(|order| json!(format!("${:.2}", order.total_cents as f64 / 100.0))))
    });
    ctx_log::register_converter("timeout_ms", |value: &dyn Any| {
        Ok(value
            .downcast_ref::<Duration>()
            .map(|timeout| json!(timeout.as_millis() as u64)))
    });

    let ctx = Context::background().with_request_id("converter-example");
    let order = Order { id: 17, total_cents: 4250 };

    ctx_log::info!(&ctx, "order placed", order);
    ctx_log::error!(
        &ctx,
        "payment timed out",
        Duration::from_secs(3),
        ErrorValue::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "gateway"))
    );
}

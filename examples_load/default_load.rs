use std::time::Instant;

use ctx_log::init::init_tracing;
use ctx_log::{Context, Logger};
use tracing::error;

fn main() {
    let logger = Logger::new(std::io::sink());
    let ctx = Context::background().with_request_id("load-test");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        ctx_log::error!(logger: logger, &ctx, "default load test error", i);
    }

    let elapsed = start.elapsed();
    println!("direct calls: wrote {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    if let Err(e) = init_tracing(logger) {
        eprintln!("{e}");
        return;
    }

    let start = Instant::now();
    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("tracing bridge: wrote {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}

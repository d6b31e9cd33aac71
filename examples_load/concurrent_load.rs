use std::time::Instant;

use ctx_log::{Context, Logger};

#[tokio::main]
async fn main() {
    let logger = Logger::new(std::io::sink());

    let tasks: u64 = 8;
    let per_task: u64 = 25_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..tasks)
        .map(|t| {
            let logger = logger.clone();
            tokio::task::spawn_blocking(move || {
                let ctx = Context::background().with_request_id(format!("task-{t}"));
                for i in 0..per_task {
                    ctx_log::info!(logger: logger, &ctx, "concurrent load test", t, i);
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(e) = handle.await {
            eprintln!("load task failed: {e}");
        }
    }

    let n = tasks * per_task;
    let elapsed = start.elapsed();
    println!("{} tasks: wrote {} records in {:?} (~{:.0} rec/s)",
        tasks,
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}

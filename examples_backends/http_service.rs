use axum::body::Bytes;
use axum::routing::{get, post};
use axum::Router;
use ctx_log::{Context, MiddlewareConfig, RequestLogLayer};

/// Serves two routes with request/response capture on every request.
///
/// Try `curl -d 'hello' localhost:3000/echo` and watch stderr.
#[tokio::main]
async fn main() {
    let config = match MiddlewareConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let logger = ctx_log::default_logger().clone();

    let app = Router::new()
        .route("/hello", get(hello))
        .route("/echo", post(echo))
        .layer(RequestLogLayer::with_config(logger, config));

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("bind failed: {e}");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("server error: {e}");
    }
}

async fn hello(ctx: Context) -> &'static str {
    ctx_log::info(&ctx, &"saying hello");
    "Hello"
}

async fn echo(ctx: Context, body: Bytes) -> Bytes {
    ctx_log::info!(&ctx, "echoing body", body.len());
    body
}

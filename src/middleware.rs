//! Request/response capture middleware.
//!
//! [`RequestLogLayer`] wraps any axum-compatible service. For each request it
//!
//! - generates a [`RequestId`], attaches a [`Context`] carrying it to the
//!   request extensions and echoes it in a response header,
//! - pre-reads up to [`MiddlewareConfig::preview_limit`] bytes of the request
//!   body without hiding them from the handler,
//! - logs `"request started"` before calling the handler and
//!   `"request finished"` once the response body has been delivered.
//!
//! Only the logged copies are truncated. Bytes seen by the handler and by
//! the client are never altered.
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use ctx_log::{Logger, RequestLogLayer};
//!
//! # async fn hello() -> &'static str { "Hello" }
//! # #[tokio::main]
//! # async fn main() {
//! let logger = Logger::new(std::io::stderr());
//! let app = Router::new()
//!     .route("/hello", get(hello))
//!     .layer(RequestLogLayer::new(logger));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, app).await.unwrap();
//! # }
//! ```

use crate::body::{peek_body, tee_body, BodyObserver, Preview};
use crate::context::{Context, RequestId};
use crate::env::{env_or, PREVIEW_LIMIT_ENV, REQUEST_ID_HEADER_ENV};
use crate::logger::{default_logger, Logger};
use crate::record::{Level, SourceLocation};
use crate::source::capture_call_site;
use axum::extract::Request;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::response::Response;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tower::{Layer, Service};

/// Default response header carrying the correlation id.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "request-id";

/// Default number of body bytes kept for logging.
pub const DEFAULT_PREVIEW_LIMIT: usize = 2048;

/// Error returned when middleware configuration cannot be loaded.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid request id header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid body preview limit {0:?}")]
    InvalidPreviewLimit(String),
}

/// Configuration for [`RequestLogLayer`].
#[derive(Clone, Debug)]
pub struct MiddlewareConfig {
    /// Response header the correlation id is written to.
    pub header_name: HeaderName,
    /// Maximum number of request and response body bytes logged.
    pub preview_limit: usize,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            header_name: HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl MiddlewareConfig {
    /// Build a configuration from `CTX_LOG_REQUEST_ID_HEADER` and
    /// `CTX_LOG_PREVIEW_LIMIT`, using the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let header = env_or(REQUEST_ID_HEADER_ENV, DEFAULT_REQUEST_ID_HEADER);
        let limit = env_or(PREVIEW_LIMIT_ENV, &DEFAULT_PREVIEW_LIMIT.to_string());
        Self::parse(&header, &limit)
    }

    fn parse(header: &str, limit: &str) -> Result<Self, ConfigError> {
        let header_name = HeaderName::try_from(header)
            .map_err(|_| ConfigError::InvalidHeaderName(header.to_string()))?;
        let preview_limit = limit
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPreviewLimit(limit.to_string()))?;
        Ok(Self {
            header_name,
            preview_limit,
        })
    }
}

/// Logged description of an inbound request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestSummary {
    pub method: String,
    pub header: BTreeMap<String, Vec<String>>,
    #[serde(rename = "URL")]
    pub url: String,
    pub proto: String,
    pub body_preview: String,
}

impl RequestSummary {
    fn new(parts: &Parts, body_preview: String) -> Self {
        RequestSummary {
            method: parts.method.to_string(),
            header: convert_headers(&parts.headers),
            url: parts.uri.to_string(),
            proto: format!("{:?}", parts.version),
            body_preview,
        }
    }
}

/// Logged description of an outbound response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseSummary {
    pub status: u16,
    pub header: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Convert a header map to name -> values, decoding values lossily.
fn convert_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut result = BTreeMap::new();
    for (name, value) in headers {
        result
            .entry(name.as_str().to_owned())
            .or_insert_with(Vec::new)
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    result
}

/// Tower layer installing the capture middleware.
///
/// Records emitted by the middleware are attributed to the place where the
/// layer was constructed.
#[derive(Clone, Debug)]
pub struct RequestLogLayer {
    logger: Logger,
    config: MiddlewareConfig,
    source: SourceLocation,
}

impl RequestLogLayer {
    #[inline(never)]
    #[track_caller]
    pub fn new(logger: Logger) -> Self {
        Self::with_config(logger, MiddlewareConfig::default())
    }

    #[inline(never)]
    #[track_caller]
    pub fn with_config(logger: Logger, config: MiddlewareConfig) -> Self {
        Self {
            logger,
            config,
            source: capture_call_site(Location::caller()),
        }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            logger: self.logger.clone(),
            config: self.config.clone(),
            source: self.source.clone(),
        }
    }
}

/// Wrap `inner` with the capture middleware, logging to the process-wide
/// logger.
#[inline(never)]
#[track_caller]
pub fn middleware<S>(inner: S) -> RequestLogService<S> {
    RequestLogLayer::new(default_logger().clone()).layer(inner)
}

/// Service produced by [`RequestLogLayer`].
#[derive(Clone, Debug)]
pub struct RequestLogService<S> {
    inner: S,
    logger: Logger,
    config: MiddlewareConfig,
    source: SourceLocation,
}

impl<S> Service<Request> for RequestLogService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let logger = self.logger.clone();
        let config = self.config.clone();
        let source = self.source.clone();

        Box::pin(async move {
            let request_id = RequestId::generate();
            let ctx = Context::background().with_request_id(request_id.clone());

            let (mut parts, body) = request.into_parts();
            parts.extensions.insert(ctx.clone());

            let peeked = peek_body(body, config.preview_limit).await;

            if let Some(err) = &peeked.error {
                logger.log_at(
                    Level::Error,
                    &ctx,
                    source.clone(),
                    &"unable to peek into buffered request body",
                    &[&RequestSummary::new(&parts, String::new()), &err.to_string()],
                );
            }

            let preview = String::from_utf8_lossy(&peeked.preview).into_owned();
            let started = RequestSummary::new(&parts, preview);
            logger.log_at(Level::Info, &ctx, source.clone(), &"request started", &[&started]);

            let request = Request::from_parts(parts, peeked.body);
            let mut response = inner.call(request).await?;

            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                response.headers_mut().insert(config.header_name.clone(), value);
            }

            let capture = ResponseCapture {
                logger,
                ctx,
                source,
                status: response.status().as_u16(),
                headers: response.headers().clone(),
                preview: Preview::new(config.preview_limit),
            };
            Ok(response.map(|body| tee_body(body, capture)))
        })
    }
}

/// Collects the response prefix and logs `"request finished"` when the body
/// is done.
struct ResponseCapture {
    logger: Logger,
    ctx: Context,
    source: SourceLocation,
    status: u16,
    headers: HeaderMap,
    preview: Preview,
}

impl BodyObserver for ResponseCapture {
    fn preview(&mut self) -> &mut Preview {
        &mut self.preview
    }

    fn finish(&mut self) {
        let finished = ResponseSummary {
            status: self.status,
            header: convert_headers(&self.headers),
            body: String::from_utf8_lossy(self.preview.as_bytes()).into_owned(),
        };
        self.logger.log_at(
            Level::Info,
            &self.ctx,
            self.source.clone(),
            &"request finished",
            &[&finished],
        );
    }
}

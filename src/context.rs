//! Correlation context carried alongside log calls.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Length of a generated [`RequestId`].
pub const REQUEST_ID_LEN: usize = 32;

static RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

/// Opaque per-request correlation identifier.
///
/// Generated ids are 32 alphanumeric characters. Uniqueness is not checked.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Draw a fresh id from the process-wide generator, seeded once from
    /// OS entropy on first use.
    pub fn generate() -> Self {
        let rng = RNG.get_or_init(|| Mutex::new(StdRng::from_entropy()));
        let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
        let id: String = (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(REQUEST_ID_LEN)
            .map(char::from)
            .collect();
        RequestId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId(id.into())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId(id.into())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestId").field(&self.as_str()).finish()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable execution context passed to every log call.
///
/// Deriving a context never mutates the parent, so one context can be
/// shared across tasks and threads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    request_id: Option<RequestId>,
}

impl Context {
    /// An empty context with no correlation id.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context carrying `id`.
    pub fn with_request_id(&self, id: impl Into<RequestId>) -> Self {
        Context {
            request_id: Some(id.into()),
        }
    }

    /// The correlation id, or `""` when none is attached.
    pub fn request_id(&self) -> &str {
        self.request_id.as_ref().map(RequestId::as_str).unwrap_or("")
    }
}

/// Returns the correlation id carried by `ctx`, or an empty string.
pub fn get_request_id(ctx: &Context) -> String {
    ctx.request_id().to_string()
}

#[cfg(feature = "middleware")]
impl<S> axum::extract::FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Context>().cloned().unwrap_or_default())
    }
}

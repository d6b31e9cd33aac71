//! Request body preview and response body tee.
//!
//! Both wrappers hand the original bytes through untouched and keep a
//! bounded copy of the prefix for logging.

use axum::body::{Body, Bytes};
use futures::{stream, Stream, StreamExt};

/// Error type for body capture operations
#[derive(Debug, thiserror::Error)]
pub enum BodyCaptureError {
    #[error("body stream error: {0}")]
    StreamError(String),
}

/// Result of pre-reading the start of a request body.
pub struct PeekedBody {
    /// Replacement body yielding every original chunk in order.
    pub body: Body,
    /// At most `limit` bytes from the start of the body.
    pub preview: Bytes,
    /// Stream error hit while reading the preview, if any.
    pub error: Option<BodyCaptureError>,
}

/// Read chunks from `body` until at least `limit` bytes are buffered or the
/// stream ends.
///
/// The returned body replays the buffered chunks followed by the unread
/// remainder, so downstream readers see the original byte sequence exactly
/// once. A stream error is replayed at the position it occurred.
pub async fn peek_body(body: Body, limit: usize) -> PeekedBody {
    let mut rest = body.into_data_stream();
    let mut buffered: Vec<Bytes> = Vec::new();
    let mut buffered_len = 0;
    let mut failure: Option<axum::Error> = None;

    while buffered_len < limit {
        match rest.next().await {
            Some(Ok(chunk)) => {
                buffered_len += chunk.len();
                buffered.push(chunk);
            }
            Some(Err(e)) => {
                failure = Some(e);
                break;
            }
            None => break,
        }
    }

    let preview = prefix(&buffered, limit);
    let error = failure
        .as_ref()
        .map(|e| BodyCaptureError::StreamError(e.to_string()));

    let replay = stream::iter(buffered.into_iter().map(Ok::<Bytes, axum::Error>))
        .chain(stream::iter(failure.map(Err)))
        .chain(rest);

    PeekedBody {
        body: Body::from_stream(replay),
        preview,
        error,
    }
}

fn prefix(chunks: &[Bytes], limit: usize) -> Bytes {
    if let [only] = chunks {
        return only.slice(..only.len().min(limit));
    }

    let mut out = Vec::with_capacity(limit.min(chunks.iter().map(Bytes::len).sum()));
    for chunk in chunks {
        let take = (limit - out.len()).min(chunk.len());
        out.extend_from_slice(&chunk[..take]);
        if out.len() == limit {
            break;
        }
    }
    Bytes::from(out)
}

/// Bounded copy of the first bytes seen by a [`tee_body`] stream.
#[derive(Debug, Default)]
pub struct Preview {
    buf: Vec<u8>,
    limit: usize,
}

impl Preview {
    pub fn new(limit: usize) -> Self {
        Preview {
            buf: Vec::new(),
            limit,
        }
    }

    pub fn observe(&mut self, chunk: &[u8]) {
        let take = self.limit.saturating_sub(self.buf.len()).min(chunk.len());
        self.buf.extend_from_slice(&chunk[..take]);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Something that wants to see a body's prefix, and to be told when the
/// body is finished with.
pub trait BodyObserver: Send + 'static {
    fn preview(&mut self) -> &mut Preview;

    /// Called exactly once, when the body stream completes or is dropped.
    fn finish(&mut self);
}

struct Finisher<O: BodyObserver>(O);

impl<O: BodyObserver> Drop for Finisher<O> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Wrap `body` so every chunk is passed through unchanged while `observer`
/// records the prefix. `observer.finish()` runs when the returned body is
/// exhausted or dropped.
pub fn tee_body<O: BodyObserver>(body: Body, observer: O) -> Body {
    let mut finisher = Finisher(observer);
    let stream = body.into_data_stream().map(move |chunk| {
        if let Ok(bytes) = &chunk {
            finisher.0.preview().observe(bytes);
        }
        chunk
    });
    Body::from_stream(FuseDrop::new(stream))
}

/// Drops the inner stream as soon as it yields `None`, so observers finish
/// when the body completes rather than whenever the server drops it.
struct FuseDrop<S> {
    inner: Option<S>,
}

impl<S> FuseDrop<S> {
    fn new(inner: S) -> Self {
        FuseDrop { inner: Some(inner) }
    }
}

impl<S: Stream + Unpin> Stream for FuseDrop<S> {
    type Item = S::Item;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return std::task::Poll::Ready(None);
        };
        match inner.poll_next_unpin(cx) {
            std::task::Poll::Ready(None) => {
                self.inner = None;
                std::task::Poll::Ready(None)
            }
            other => other,
        }
    }
}

//! Response body streaming.
//! Mirrors Chromium's HttpStream::ReadResponseBody.

use crate::base::neterror::{BoxError, NetError};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http::HeaderMap;
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

/// Receives response trailers once the body has been fully read.
pub type TrailerCallback = Arc<dyn Fn(&HeaderMap) -> Result<(), BoxError> + Send + Sync>;

/// Lazily-consumed response body.
///
/// Yields data chunks as a [`Stream`]. A trailers frame, if the peer sends
/// one, is handed to the attached [`TrailerCallback`]; callback failures are
/// logged and never end the stream with an error.
pub struct ResponseBody {
    inner: UnsyncBoxBody<Bytes, NetError>,
    on_trailers: Option<TrailerCallback>,
    done: bool,
}

impl ResponseBody {
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes, Error = NetError> + Send + 'static,
    {
        Self {
            inner: body.boxed_unsync(),
            on_trailers: None,
            done: false,
        }
    }

    /// Wrap a hyper body; transport errors pass through as `NetError::Transport`.
    pub fn from_incoming(inner: Incoming) -> Self {
        Self::new(inner.map_err(NetError::from))
    }

    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new().map_err(|never: Infallible| -> NetError { match never {} }))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(
            Full::new(bytes.into()).map_err(|never: Infallible| -> NetError { match never {} }),
        )
    }

    /// Attach the receiver for trailers.
    pub fn with_trailer_callback(mut self, callback: Option<TrailerCallback>) -> Self {
        self.on_trailers = callback;
        self
    }

    /// Whether the peer has signalled the end of the body.
    pub fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    /// Read the next data chunk.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, NetError> {
        self.next().await.transpose()
    }

    /// Read entire body as bytes.
    pub async fn bytes(mut self) -> Result<Bytes, NetError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    fn deliver_trailers(&self, trailers: &HeaderMap) {
        let Some(callback) = self.on_trailers.as_ref() else {
            return;
        };
        if let Err(e) = callback(trailers) {
            tracing::warn!(error = %e, "trailer delivery failed");
        }
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, NetError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut self.inner).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => return Poll::Ready(Some(Ok(data))),
                    Err(frame) => {
                        if let Ok(trailers) = frame.into_trailers() {
                            self.deliver_trailers(&trailers);
                        }
                    }
                },
                Some(Err(e)) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    self.done = true;
                }
            }
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("done", &self.done)
            .field("on_trailers", &self.on_trailers.is_some())
            .finish()
    }
}

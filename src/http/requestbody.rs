//! Request body sources and the body inspector.

use crate::base::neterror::NetError;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Body type handed to the wire connection.
pub type TransportBody = UnsyncBoxBody<Bytes, NetError>;

/// A one-shot chunk stream, shared so requests stay cheaply clonable.
pub type SharedStream = Arc<Mutex<Option<BoxStream<'static, Result<Bytes, NetError>>>>>;

pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=UTF-8";
pub const FORM_URLENCODED_UTF8: &str = "application/x-www-form-urlencoded;charset=UTF-8";
pub const APPLICATION_JSON: &str = "application/json";

/// Request body for HTTP methods that send data.
#[derive(Clone, Default)]
pub enum RequestBody {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Raw bytes; no inferred content type.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(String),
    /// `application/x-www-form-urlencoded`, already serialized.
    Form(Bytes),
    /// JSON document, already serialized.
    Json(Bytes),
    /// Chunks of unknown total length. Can be sent only once.
    Stream(SharedStream),
}

/// What the body inspector can tell about a body without consuming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyInfo {
    pub length: Option<u64>,
    pub mime: Option<&'static str>,
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl RequestBody {
    /// Serialize `pairs` as an urlencoded form.
    pub fn form<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        RequestBody::Form(Bytes::from(encoded))
    }

    /// Serialize `value` as JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self, NetError> {
        let bytes = serde_json::to_vec(value).map_err(|_| NetError::HttpBodyError)?;
        Ok(RequestBody::Json(Bytes::from(bytes)))
    }

    /// Wrap a chunk stream of unknown length.
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        RequestBody::Stream(Arc::new(Mutex::new(Some(Box::pin(stream)))))
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.inspect().length == Some(0)
    }

    /// Length and mime type, where statically knowable.
    pub fn inspect(&self) -> BodyInfo {
        let (length, mime) = match self {
            RequestBody::Empty => (Some(0), None),
            RequestBody::Bytes(b) => (Some(b.len() as u64), None),
            RequestBody::Text(s) => (Some(s.len() as u64), Some(TEXT_PLAIN_UTF8)),
            RequestBody::Form(b) => (Some(b.len() as u64), Some(FORM_URLENCODED_UTF8)),
            RequestBody::Json(b) => (Some(b.len() as u64), Some(APPLICATION_JSON)),
            RequestBody::Stream(_) => (None, None),
        };
        BodyInfo { length, mime }
    }

    /// Convert into the wire body. Fails if a stream body was already sent.
    pub fn into_transport_body(self) -> Result<TransportBody, NetError> {
        let full = |bytes: Bytes| -> TransportBody {
            Full::new(bytes)
                .map_err(|never: Infallible| -> NetError { match never {} })
                .boxed_unsync()
        };

        Ok(match self {
            RequestBody::Empty => Empty::new()
                .map_err(|never: Infallible| -> NetError { match never {} })
                .boxed_unsync(),
            RequestBody::Bytes(b) | RequestBody::Form(b) | RequestBody::Json(b) => full(b),
            RequestBody::Text(s) => full(Bytes::from(s)),
            RequestBody::Stream(shared) => {
                let stream = shared
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take()
                    .ok_or(NetError::BodyAlreadyUsed)?;
                StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync()
            }
        })
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            RequestBody::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            RequestBody::Form(b) => f.debug_tuple("Form").field(&b.len()).finish(),
            RequestBody::Json(b) => f.debug_tuple("Json").field(&b.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

//! HTTP Response with body access.

use crate::base::neterror::NetError;
use crate::http::ResponseBody;
use crate::urlrequest::context::ContentDecoder;
use http::{HeaderMap, StatusCode, Version};
use url::Url;

/// HTTP Response with accessible body.
///
/// This is the user-facing response type, identical whichever wire
/// protocol served it. Cookie-setting headers have already been consumed
/// into the session's cookie jar and are not present in [`headers`](Self::headers).
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
    redirected: bool,
    content_decoders: Vec<ContentDecoder>,
    integrity: Option<String>,
    body: Option<ResponseBody>,
}

impl HttpResponse {
    pub(crate) fn new(
        parts: http::response::Parts,
        body: ResponseBody,
        url: Url,
        redirected: bool,
    ) -> Self {
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            url,
            redirected,
            content_decoders: Vec::new(),
            integrity: None,
            body: Some(body),
        }
    }

    /// A status-only response for interim (1xx) signaling. Carries no body.
    pub(crate) fn informational(status: StatusCode, version: Version, url: Url) -> Self {
        Self {
            status,
            version,
            headers: HeaderMap::new(),
            url,
            redirected: false,
            content_decoders: Vec::new(),
            integrity: None,
            body: None,
        }
    }

    pub(crate) fn with_content_decoders(mut self, decoders: Vec<ContentDecoder>) -> Self {
        self.content_decoders = decoders;
        self
    }

    pub(crate) fn with_integrity(mut self, integrity: Option<String>) -> Self {
        self.integrity = integrity;
        self
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the status, or an empty string.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get the HTTP version marker of the connection that served this response.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL that produced this response (the last hop of a redirect chain).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether this response came from a followed redirect.
    pub fn redirected(&self) -> bool {
        self.redirected
    }

    /// Decoders configured on the session, in preference order.
    pub fn content_decoders(&self) -> &[ContentDecoder] {
        &self.content_decoders
    }

    /// Integrity descriptor the request carried.
    pub fn integrity(&self) -> Option<&str> {
        self.integrity.as_deref()
    }

    /// Take the response body for consumption.
    /// Can only be called once - subsequent calls return None.
    pub fn take_body(&mut self) -> Option<ResponseBody> {
        self.body.take()
    }

    /// Convenience method to consume body as bytes.
    pub async fn bytes(mut self) -> Result<bytes::Bytes, NetError> {
        match self.body.take() {
            Some(body) => body.bytes().await,
            None if self.status.is_informational() => Ok(bytes::Bytes::new()),
            None => Err(NetError::HttpBodyError),
        }
    }
}

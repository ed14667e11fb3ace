use crate::base::abort::AbortSignal;
use crate::base::neterror::NetError;
use crate::http::requestbody::RequestBody;
use crate::http::responsebody::TrailerCallback;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// What to do when a response carries a redirect status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
    /// Re-issue the request against `Location`.
    #[default]
    Follow,
    /// Fail with [`NetError::Redirection`].
    Error,
    /// Hand the 3xx response to the caller as-is.
    Manual,
}

/// A protocol-agnostic request description.
///
/// The engine only reads a `Request`; following a redirect produces a new
/// one via [`Request::clone_with_url`].
#[derive(Clone)]
pub struct Request {
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<RequestBody>,
    redirect: RedirectMode,
    integrity: Option<String>,
    signal: Option<AbortSignal>,
    timeout: Option<Duration>,
    on_trailers: Option<TrailerCallback>,
}

impl Request {
    pub fn new(url_str: &str) -> Result<Self, NetError> {
        let url = Url::parse(url_str).map_err(|_| NetError::InvalidUrl)?;
        Ok(Self::from_url(url))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            redirect: RedirectMode::default(),
            integrity: None,
            signal: None,
            timeout: None,
            on_trailers: None,
        }
    }

    /// Same request, bound to `url`. Headers, body, redirect policy, signal,
    /// timeout and trailer callback carry over unchanged.
    pub fn clone_with_url(&self, url: Url) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn redirect(&self) -> RedirectMode {
        self.redirect
    }

    pub fn integrity(&self) -> Option<&str> {
        self.integrity.as_deref()
    }

    pub fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn on_trailers(&self) -> Option<&TrailerCallback> {
        self.on_trailers.as_ref()
    }

    /// GET and HEAD requests never carry a body.
    pub fn is_bodyless(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Add a header to the request, keeping earlier values of the same name.
    /// Returns an error if the header name or value is invalid.
    pub fn add_header(&mut self, key: &str, value: &str) -> Result<(), NetError> {
        let name = HeaderName::from_str(key).map_err(|_| NetError::InvalidHeader)?;
        let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn remove_header(&mut self, key: &str) {
        self.headers.remove(key);
    }

    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    pub fn set_body(&mut self, body: impl Into<RequestBody>) {
        self.body = Some(body.into());
    }

    pub fn set_redirect(&mut self, mode: RedirectMode) {
        self.redirect = mode;
    }

    pub fn set_integrity(&mut self, integrity: impl Into<String>) {
        self.integrity = Some(integrity.into());
    }

    pub fn set_signal(&mut self, signal: AbortSignal) {
        self.signal = Some(signal);
    }

    /// Total time budget for the call, including every redirect hop.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn set_trailer_callback(&mut self, callback: TrailerCallback) {
        self.on_trailers = Some(callback);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("redirect", &self.redirect)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

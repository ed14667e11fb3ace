//! URL Request Context - the session a fetch runs in.
//!
//! The engine depends only on the [`Session`] capability: protocol identity,
//! default header values, configured content decoders, a cookie jar and a
//! way to borrow connections. [`URLRequestContext`] is the concrete,
//! configurable implementation backed by [`CookieMonster`] and
//! [`HttpStreamFactory`].

use crate::base::neterror::NetError;
use crate::cookies::monster::CookieMonster;
use crate::cookies::CookieJar;
use crate::http::streamfactory::{HttpConnection, HttpStreamFactory};
use crate::http::HttpResponse;
use crate::urlrequest::job;
use crate::urlrequest::request::Request;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use url::Url;

/// Chromium's redirect limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Wire protocol a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpProtocol {
    /// HTTP/1.1: method, scheme and path are positional on the request line.
    #[default]
    Http1,
    /// HTTP/2: multiplexed, with `:method`/`:scheme`/`:path`/`:authority` pseudo-headers.
    Http2,
}

impl HttpProtocol {
    pub fn is_multiplexed(self) -> bool {
        self == HttpProtocol::Http2
    }
}

/// A content-decoding codec the session can apply to response bodies.
/// Only its name matters to the engine, for `accept-encoding`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDecoder {
    pub name: String,
}

impl ContentDecoder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Alias for the `Future` returned by [`Session::acquire_connection`].
pub type Connecting<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn HttpConnection>, NetError>> + Send + 'a>>;

/// Session capability consumed by the fetch engine.
///
/// Implementations must be thread-safe; the engine only ever borrows them.
pub trait Session: Send + Sync {
    fn protocol(&self) -> HttpProtocol;

    /// Default `accept` header value.
    fn accept(&self) -> &str;

    /// Default `user-agent` header value.
    fn user_agent(&self) -> &str;

    /// Configured decoders, most preferred first.
    fn content_decoders(&self) -> &[ContentDecoder];

    fn cookie_jar(&self) -> &dyn CookieJar;

    /// Borrow a connection able to serve `url`.
    fn acquire_connection<'a>(&'a self, url: &'a Url) -> Connecting<'a>;

    /// Hand a connection back once a response head has been received.
    /// The default drops it.
    fn release_connection(&self, url: &Url, connection: Box<dyn HttpConnection>) {
        let _ = (url, connection);
    }

    /// Longest redirect chain the session will follow.
    fn max_redirects(&self) -> usize {
        DEFAULT_MAX_REDIRECTS
    }

    /// Drop credential headers when a followed redirect changes origin.
    fn strip_credentials_on_cross_origin(&self) -> bool {
        true
    }
}

/// Configuration options for URLRequestContext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct URLRequestContextConfig {
    /// Wire protocol for every connection this context opens.
    pub protocol: HttpProtocol,

    /// User-Agent string to use for requests.
    pub user_agent: String,

    /// Accept header value.
    pub accept: String,

    /// Content decoders, most preferred first.
    pub content_decoders: Vec<ContentDecoder>,

    /// Longest redirect chain to follow.
    pub max_redirects: usize,

    /// Idle connections kept per origin.
    pub max_idle_per_host: usize,

    /// Drop credential headers on cross-origin redirects.
    pub strip_credentials_on_cross_origin_redirect: bool,
}

impl Default for URLRequestContextConfig {
    fn default() -> Self {
        Self {
            protocol: HttpProtocol::Http1,
            user_agent: concat!("unifetch/", env!("CARGO_PKG_VERSION")).to_string(),
            accept: "*/*".to_string(),
            content_decoders: Vec::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_idle_per_host: 6,
            strip_credentials_on_cross_origin_redirect: true,
        }
    }
}

/// Central configuration for network requests.
///
/// Mirrors Chromium's URLRequestContext, bundling together:
/// - HTTP stream factory (connection establishment and reuse)
/// - Cookie store
/// - Default header values and protocol choice
pub struct URLRequestContext {
    /// HTTP stream factory for creating connections.
    stream_factory: Arc<HttpStreamFactory>,

    /// Cookie storage.
    cookie_store: Arc<CookieMonster>,

    /// Configuration options.
    config: URLRequestContextConfig,
}

impl URLRequestContext {
    /// Create a new URLRequestContext with default configuration.
    pub fn new() -> Self {
        Self::with_config(URLRequestContextConfig::default())
    }

    /// Create a new URLRequestContext with custom configuration.
    pub fn with_config(config: URLRequestContextConfig) -> Self {
        let stream_factory = Arc::new(HttpStreamFactory::new(
            config.protocol,
            config.max_idle_per_host,
        ));

        Self {
            stream_factory,
            cookie_store: Arc::new(CookieMonster::new()),
            config,
        }
    }

    /// Share an existing cookie store.
    pub fn with_cookie_store(mut self, store: Arc<CookieMonster>) -> Self {
        self.cookie_store = store;
        self
    }

    /// Load configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::with_config(serde_json::from_str(json)?))
    }

    /// Get the HTTP stream factory.
    pub fn stream_factory(&self) -> &Arc<HttpStreamFactory> {
        &self.stream_factory
    }

    /// Get the cookie store.
    pub fn cookie_store(&self) -> &Arc<CookieMonster> {
        &self.cookie_store
    }

    pub fn config(&self) -> &URLRequestContextConfig {
        &self.config
    }

    /// Execute `request` in this context.
    pub async fn fetch(&self, request: Request) -> Result<HttpResponse, NetError> {
        job::fetch(self, request).await
    }
}

impl Default for URLRequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for URLRequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("URLRequestContext")
            .field("config", &self.config)
            .field("cookie_store", &self.cookie_store)
            .finish_non_exhaustive()
    }
}

impl Session for URLRequestContext {
    fn protocol(&self) -> HttpProtocol {
        self.config.protocol
    }

    fn accept(&self) -> &str {
        &self.config.accept
    }

    fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    fn content_decoders(&self) -> &[ContentDecoder] {
        &self.config.content_decoders
    }

    fn cookie_jar(&self) -> &dyn CookieJar {
        self.cookie_store.as_ref()
    }

    fn acquire_connection<'a>(&'a self, url: &'a Url) -> Connecting<'a> {
        Box::pin(self.stream_factory.request_stream(url))
    }

    fn release_connection(&self, url: &Url, connection: Box<dyn HttpConnection>) {
        self.stream_factory.release(url, connection);
    }

    fn max_redirects(&self) -> usize {
        self.config.max_redirects
    }

    fn strip_credentials_on_cross_origin(&self) -> bool {
        self.config.strip_credentials_on_cross_origin_redirect
    }
}

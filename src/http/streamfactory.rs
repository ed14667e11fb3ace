//! Connection capability and its hyper-backed implementation.
//!
//! [`HttpConnection`] is all the engine needs from a connection: send one
//! request, get a response head with a lazy body. [`HttpStream`] implements
//! it over hyper's h1 and h2 client handshakes; [`HttpStreamFactory`] dials
//! plain TCP and keeps idle connections per origin.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::requestbody::TransportBody;
use crate::http::responsebody::ResponseBody;
use crate::urlrequest::context::HttpProtocol;
use dashmap::DashMap;
use http::{Request, Response, Version};
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::spawn;
use url::Url;

/// Alias for the `Future` returned by [`HttpConnection::send_request`].
pub type Sending<'a> =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, NetError>> + Send + 'a>>;

/// A connection able to carry one request at a time for the engine.
pub trait HttpConnection: Send + Sync {
    /// Wire version this connection speaks.
    fn version(&self) -> Version;

    /// Send `request` and resolve once the response head is in.
    fn send_request(&mut self, request: Request<TransportBody>) -> Sending<'_>;

    /// Whether the peer has announced shutdown or the connection failed.
    fn goaway_seen(&self) -> bool {
        false
    }

    /// Whether the connection may serve another request.
    fn is_reusable(&self) -> bool {
        !self.goaway_seen()
    }
}

enum Sender {
    H1(http1::SendRequest<TransportBody>),
    H2(http2::SendRequest<TransportBody>),
}

/// Wraps the underlying protocol stream (H1/H2).
/// Equivalent to net::HttpStream.
pub struct HttpStream {
    sender: Sender,
    /// Set once, by the connection driver on exit or by a failed send.
    goaway_seen: Arc<AtomicBool>,
}

impl HttpStream {
    fn new(sender: Sender, goaway_seen: Arc<AtomicBool>) -> Self {
        Self {
            sender,
            goaway_seen,
        }
    }

    pub fn is_h2(&self) -> bool {
        matches!(self.sender, Sender::H2(_))
    }

    /// Another handle onto the same h2 connection. `None` for h1.
    pub fn share(&self) -> Option<HttpStream> {
        match &self.sender {
            Sender::H2(sender) => Some(HttpStream::new(
                Sender::H2(sender.clone()),
                self.goaway_seen.clone(),
            )),
            Sender::H1(_) => None,
        }
    }

    /// Whether the connection can take a request right now.
    pub fn is_idle(&self) -> bool {
        match &self.sender {
            Sender::H1(sender) => sender.is_ready(),
            Sender::H2(sender) => sender.is_ready(),
        }
    }

    fn mark_goaway(&self) {
        if !self.goaway_seen.swap(true, Ordering::AcqRel) {
            tracing::debug!(h2 = self.is_h2(), "connection no longer reusable");
        }
    }

    async fn send(
        &mut self,
        request: Request<TransportBody>,
    ) -> Result<Response<ResponseBody>, NetError> {
        let result = match &mut self.sender {
            Sender::H1(sender) => match sender.ready().await {
                Ok(()) => sender.send_request(request).await,
                Err(e) => Err(e),
            },
            Sender::H2(sender) => match sender.ready().await {
                Ok(()) => sender.send_request(request).await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(response) => Ok(response.map(ResponseBody::from_incoming)),
            Err(e) => {
                self.mark_goaway();
                Err(NetError::from(e))
            }
        }
    }
}

impl HttpConnection for HttpStream {
    fn version(&self) -> Version {
        match self.sender {
            Sender::H1(_) => Version::HTTP_11,
            Sender::H2(_) => Version::HTTP_2,
        }
    }

    fn send_request(&mut self, request: Request<TransportBody>) -> Sending<'_> {
        Box::pin(self.send(request))
    }

    fn goaway_seen(&self) -> bool {
        if self.goaway_seen.load(Ordering::Acquire) {
            return true;
        }
        let closed = match &self.sender {
            Sender::H1(sender) => sender.is_closed(),
            Sender::H2(sender) => sender.is_closed(),
        };
        if closed {
            self.mark_goaway();
        }
        closed
    }

    fn is_reusable(&self) -> bool {
        !self.goaway_seen() && self.is_idle()
    }
}

/// Dials connections for one protocol and keeps idle ones per origin.
pub struct HttpStreamFactory {
    protocol: HttpProtocol,
    max_idle_per_host: usize,
    /// Idle h1 connections, oldest first.
    idle: DashMap<String, VecDeque<Box<dyn HttpConnection>>>,
    /// One multiplexed h2 connection per origin.
    shared: DashMap<String, HttpStream>,
}

impl HttpStreamFactory {
    pub fn new(protocol: HttpProtocol, max_idle_per_host: usize) -> Self {
        Self {
            protocol,
            max_idle_per_host,
            idle: DashMap::new(),
            shared: DashMap::new(),
        }
    }

    pub fn protocol(&self) -> HttpProtocol {
        self.protocol
    }

    /// Number of idle h1 connections held for `url`'s origin.
    pub fn idle_count(&self, url: &Url) -> usize {
        self.idle.get(&origin_key(url)).map(|q| q.len()).unwrap_or(0)
    }

    /// Get a connection for `url`, reusing an idle or shared one if possible.
    pub async fn request_stream(&self, url: &Url) -> Result<Box<dyn HttpConnection>, NetError> {
        let key = origin_key(url);

        match self.protocol {
            HttpProtocol::Http1 => {
                if let Some(conn) = self.take_idle(&key) {
                    tracing::debug!(origin = %key, "reusing idle connection");
                    return Ok(conn);
                }
            }
            HttpProtocol::Http2 => {
                if let Some(stream) = self.shared.get(&key).and_then(|s| {
                    if s.goaway_seen() {
                        None
                    } else {
                        s.share()
                    }
                }) {
                    tracing::debug!(origin = %key, "multiplexing onto shared connection");
                    return Ok(Box::new(stream));
                }
                self.shared.remove_if(&key, |_, s| s.goaway_seen());
            }
        }

        let stream = self.connect(url).await?;
        if let Some(shared) = stream.share() {
            self.shared.insert(key, shared);
        }
        Ok(Box::new(stream))
    }

    /// Return a connection after its response head has been read.
    pub fn release(&self, url: &Url, connection: Box<dyn HttpConnection>) {
        if self.protocol.is_multiplexed()
            || self.max_idle_per_host == 0
            || connection.goaway_seen()
        {
            return;
        }

        let mut queue = self.idle.entry(origin_key(url)).or_default();
        if queue.len() >= self.max_idle_per_host {
            queue.pop_front();
        }
        queue.push_back(connection);
    }

    fn take_idle(&self, key: &str) -> Option<Box<dyn HttpConnection>> {
        let mut queue = self.idle.get_mut(key)?;
        queue.retain(|c| !c.goaway_seen());
        let pos = queue.iter().position(|c| c.is_reusable())?;
        queue.remove(pos)
    }

    async fn connect(&self, url: &Url) -> Result<HttpStream, NetError> {
        if url.scheme() != "http" {
            return Err(NetError::DisallowedUrlScheme);
        }
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        // 1. Get raw socket
        let socket = TcpStream::connect((host, port))
            .await
            .connection_context(host, port)?;
        let _ = socket.set_nodelay(true);
        let io = TokioIo::new(socket);
        let goaway_seen = Arc::new(AtomicBool::new(false));

        // 2. Handshake, 3. spawn the connection driver
        let sender = match self.protocol {
            HttpProtocol::Http1 => {
                let (sender, conn) = http1::handshake(io).await?;
                let flag = goaway_seen.clone();
                spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!(error = %e, "h1 connection closed with error");
                    }
                    flag.store(true, Ordering::Release);
                });
                Sender::H1(sender)
            }
            HttpProtocol::Http2 => {
                let (sender, conn) = http2::handshake(TokioExecutor::new(), io).await?;
                let flag = goaway_seen.clone();
                spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!(error = %e, "h2 connection closed with error");
                    }
                    flag.store(true, Ordering::Release);
                });
                Sender::H2(sender)
            }
        };

        tracing::debug!(host, port, protocol = ?self.protocol, "connected");
        Ok(HttpStream::new(sender, goaway_seen))
    }
}

impl std::fmt::Debug for HttpStreamFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStreamFactory")
            .field("protocol", &self.protocol)
            .field("max_idle_per_host", &self.max_idle_per_host)
            .field("idle_origins", &self.idle.len())
            .field("shared_origins", &self.shared.len())
            .finish()
    }
}

fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

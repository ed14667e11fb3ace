//! Scripted in-memory session shared by the engine-level tests.
#![allow(dead_code)]

use bytes::Bytes;
use http::{HeaderMap, Method, Response, Version};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unifetch::cookies::monster::CookieMonster;
use unifetch::cookies::CookieJar;
use unifetch::http::requestbody::TransportBody;
use unifetch::http::streamfactory::{HttpConnection, Sending};
use unifetch::urlrequest::context::Connecting;
use unifetch::{ContentDecoder, HttpProtocol, NetError, ResponseBody, Session};
use url::Url;

/// A canned reply for one URL.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub delay: Duration,
    pub trailers: Option<HeaderMap>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: Duration::ZERO,
            trailers: None,
        }
    }

    pub fn ok(body: &'static str) -> Self {
        Self {
            body: Bytes::from_static(body.as_bytes()),
            ..Self::status(200)
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::status(status).header("location", location)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_trailers(mut self, trailers: HeaderMap) -> Self {
        self.trailers = Some(trailers);
        self
    }

    fn into_response(self) -> Response<ResponseBody> {
        let body = match self.trailers {
            Some(trailers) => {
                let frames = futures::stream::iter(vec![
                    Ok::<_, NetError>(Frame::data(self.body)),
                    Ok(Frame::trailers(trailers)),
                ]);
                ResponseBody::new(StreamBody::new(frames))
            }
            None => ResponseBody::from_bytes(self.body),
        };

        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(body).unwrap()
    }
}

/// What a connection was asked to send.
#[derive(Clone, Debug)]
pub struct Sent {
    /// URL the connection was acquired for.
    pub url: Url,
    pub method: Method,
    pub uri: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct MockSession {
    pub protocol: HttpProtocol,
    pub decoders: Vec<ContentDecoder>,
    pub jar: CookieMonster,
    pub max_redirects: usize,
    routes: HashMap<String, Reply>,
    sent: Arc<Mutex<Vec<Sent>>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            protocol: HttpProtocol::Http1,
            decoders: Vec::new(),
            jar: CookieMonster::new(),
            max_redirects: 20,
            routes: HashMap::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn route(mut self, url: &str, reply: Reply) -> Self {
        let key = Url::parse(url).unwrap().to_string();
        self.routes.insert(key, reply);
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Session for MockSession {
    fn protocol(&self) -> HttpProtocol {
        self.protocol
    }

    fn accept(&self) -> &str {
        "*/*"
    }

    fn user_agent(&self) -> &str {
        "unifetch-test/1.0"
    }

    fn content_decoders(&self) -> &[ContentDecoder] {
        &self.decoders
    }

    fn cookie_jar(&self) -> &dyn CookieJar {
        &self.jar
    }

    fn acquire_connection<'a>(&'a self, url: &'a Url) -> Connecting<'a> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let mut key = url.clone();
        key.set_fragment(None);
        let reply = self
            .routes
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| Reply::status(404));
        let version = match self.protocol {
            HttpProtocol::Http1 => Version::HTTP_11,
            HttpProtocol::Http2 => Version::HTTP_2,
        };
        let conn = MockConnection {
            url: url.clone(),
            version,
            reply: Some(reply),
            sent: self.sent.clone(),
        };
        Box::pin(async move { Ok(Box::new(conn) as Box<dyn HttpConnection>) })
    }

    fn release_connection(&self, _url: &Url, _connection: Box<dyn HttpConnection>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn max_redirects(&self) -> usize {
        self.max_redirects
    }
}

struct MockConnection {
    url: Url,
    version: Version,
    reply: Option<Reply>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl HttpConnection for MockConnection {
    fn version(&self) -> Version {
        self.version
    }

    fn send_request(&mut self, request: http::Request<TransportBody>) -> Sending<'_> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = body.collect().await?.to_bytes();
            self.sent.lock().unwrap().push(Sent {
                url: self.url.clone(),
                method: parts.method,
                uri: parts.uri.to_string(),
                version: parts.version,
                headers: parts.headers,
                body,
            });

            let reply = self.reply.take().ok_or(NetError::ConnectionClosed)?;
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            let mut response = reply.into_response();
            *response.version_mut() = self.version;
            Ok::<_, NetError>(response)
        })
    }
}

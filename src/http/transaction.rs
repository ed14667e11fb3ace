//! Transport adapter: one assembled request over one borrowed connection.
//!
//! Mirrors Chromium's HttpNetworkTransaction state loop, reduced to the two
//! steps the engine needs. The wire request is built from the assembled
//! headers; how method, scheme and path travel depends on the protocol
//! (positional on the h1 request line, pseudo-headers on h2).

use crate::base::neterror::NetError;
use crate::http::assembler::{AssembledRequest, PseudoHeader};
use crate::http::requestbody::{RequestBody, TransportBody};
use crate::http::responsebody::ResponseBody;
use crate::http::streamfactory::HttpConnection;
use http::header::{self, HeaderValue};
use http::{Request, Response, StatusCode, Version};
use url::Position;

/// What the connection produced for one attempt.
#[derive(Debug)]
pub enum TransportOutcome {
    /// An interim status with no body.
    Informational(StatusCode, Version),
    /// A final response head with its lazy body.
    Response(Response<ResponseBody>),
}

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sending,
    AwaitingStatus,
    Done,
}

pub struct HttpNetworkTransaction {
    assembled: AssembledRequest,
    state: State,
    response: Option<Response<ResponseBody>>,
}

impl HttpNetworkTransaction {
    pub fn new(assembled: AssembledRequest) -> Self {
        Self {
            assembled,
            state: State::Sending,
            response: None,
        }
    }

    /// Build the request handed to the connection.
    ///
    /// The URL fragment never goes on the wire. h1 gets an origin-form
    /// target and a `host` header if the caller did not supply one.
    pub fn build_wire_request(&self) -> Result<Request<TransportBody>, NetError> {
        let assembled = &self.assembled;
        let url = &assembled.url;
        let mut headers = assembled.header_map();

        let (uri, version) = if assembled.protocol.is_multiplexed() {
            let authority = assembled
                .pseudo(PseudoHeader::Authority)
                .ok_or(NetError::InvalidUrl)?;
            let scheme = assembled
                .pseudo(PseudoHeader::Scheme)
                .unwrap_or_else(|| url.scheme());
            let path = assembled
                .pseudo(PseudoHeader::Path)
                .map(strip_fragment)
                .unwrap_or("/");
            (format!("{}://{}{}", scheme, authority, path), Version::HTTP_2)
        } else {
            if !headers.contains_key(header::HOST) {
                let authority = &url[Position::BeforeHost..Position::AfterPort];
                let host = HeaderValue::from_str(authority).map_err(|_| NetError::InvalidUrl)?;
                headers.insert(header::HOST, host);
            }
            (
                url[Position::BeforePath..Position::AfterQuery].to_string(),
                Version::HTTP_11,
            )
        };

        let body = if assembled.end_stream {
            RequestBody::Empty
        } else {
            assembled.body.clone().unwrap_or_default()
        };

        let mut request = Request::builder()
            .method(assembled.method.clone())
            .uri(uri)
            .version(version)
            .body(body.into_transport_body()?)
            .map_err(|_| NetError::InvalidUrl)?;
        *request.headers_mut() = headers;
        Ok(request)
    }

    /// Send over `connection` and classify the reply.
    pub async fn start(
        &mut self,
        connection: &mut dyn HttpConnection,
    ) -> Result<TransportOutcome, NetError> {
        loop {
            match self.state {
                State::Sending => {
                    let request = self.build_wire_request()?;
                    tracing::trace!(
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                        "sending request"
                    );
                    self.response = Some(connection.send_request(request).await?);
                    self.state = State::AwaitingStatus;
                }
                State::AwaitingStatus => {
                    self.state = State::Done;
                    let response = self.response.take().ok_or(NetError::ConnectionClosed)?;
                    return classify(response);
                }
                State::Done => return Err(NetError::ConnectionClosed),
            }
        }
    }
}

fn classify(response: Response<ResponseBody>) -> Result<TransportOutcome, NetError> {
    let status = response.status();
    match status {
        StatusCode::CONTINUE => Err(NetError::InformationalProtocol),
        StatusCode::SWITCHING_PROTOCOLS => Err(NetError::UpgradeUnsupported),
        s if s.is_informational() => {
            Ok(TransportOutcome::Informational(status, response.version()))
        }
        _ => Ok(TransportOutcome::Response(response)),
    }
}

fn strip_fragment(path: &str) -> &str {
    path.split('#').next().unwrap_or(path)
}

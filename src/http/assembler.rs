//! Header & body assembly.
//!
//! Turns a protocol-agnostic [`Request`] plus session policy and a cookie
//! snapshot into the concrete header set and body framing for one attempt.
//! Pure and synchronous: no I/O, no jar access beyond the snapshot passed in.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::RequestBody;
use crate::urlrequest::context::{ContentDecoder, HttpProtocol, Session};
use crate::urlrequest::request::Request;
use http::header::{self, HeaderValue};
use http::{HeaderMap, Method};
use url::{Position, Url};

/// Fallback list when no decoders are configured.
const FALLBACK_ENCODINGS: &str = "gzip;q=1.0, deflate;q=0.5";
/// Fallback list appended after configured decoders.
const TRAILING_ENCODINGS: &str = "gzip;q=0.8, deflate;q=0.5";

/// Request pseudo-headers of the multiplexed protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoHeader {
    Method,
    Scheme,
    Authority,
    Path,
}

impl PseudoHeader {
    pub fn as_str(self) -> &'static str {
        match self {
            PseudoHeader::Method => ":method",
            PseudoHeader::Scheme => ":scheme",
            PseudoHeader::Authority => ":authority",
            PseudoHeader::Path => ":path",
        }
    }
}

/// Final header set and body framing for one attempt.
#[derive(Debug, Clone)]
pub struct AssembledRequest {
    pub method: Method,
    pub url: Url,
    pub protocol: HttpProtocol,
    /// Empty under HTTP/1.1.
    pub pseudo_headers: Vec<(PseudoHeader, String)>,
    pub headers: OrderedHeaderMap,
    /// True for GET and HEAD: no body is sent.
    pub end_stream: bool,
    pub body: Option<RequestBody>,
    /// Set only when inferred from the body.
    pub content_length: Option<u64>,
    /// Set only when inferred from the body.
    pub content_type: Option<&'static str>,
    pub cookie: Option<String>,
    pub accept_encoding: String,
}

impl AssembledRequest {
    pub fn pseudo(&self, which: PseudoHeader) -> Option<&str> {
        self.pseudo_headers
            .iter()
            .find(|(p, _)| *p == which)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_map(&self) -> HeaderMap {
        self.headers.clone().to_header_map()
    }
}

/// Compose `accept-encoding` from the decoder chain, preserving its order.
pub fn accept_encoding(decoders: &[ContentDecoder]) -> String {
    if decoders.is_empty() {
        return FALLBACK_ENCODINGS.to_string();
    }

    let mut parts: Vec<String> = decoders
        .iter()
        .map(|d| format!("{};q=1.0", d.name))
        .collect();
    parts.push(TRAILING_ENCODINGS.to_string());
    parts.join(", ")
}

/// Build the outgoing header set for `request`.
///
/// `prior_cookies` is the jar snapshot for the request URL, already in send
/// order. Cookie values present on the request itself are appended after it.
pub fn assemble(
    session: &dyn Session,
    request: &Request,
    prior_cookies: &[String],
) -> Result<AssembledRequest, NetError> {
    let url = request.url();
    let method = request.method().clone();
    let protocol = session.protocol();
    let end_stream = request.is_bodyless();

    let authority = &url[Position::BeforeHost..Position::AfterPort];
    if authority.is_empty() {
        return Err(NetError::InvalidUrl);
    }

    let mut pseudo_headers = Vec::new();
    if protocol.is_multiplexed() {
        pseudo_headers.push((PseudoHeader::Method, method.as_str().to_string()));
        pseudo_headers.push((PseudoHeader::Scheme, url.scheme().to_string()));
        pseudo_headers.push((PseudoHeader::Authority, authority.to_string()));
        pseudo_headers.push((PseudoHeader::Path, url[Position::BeforePath..].to_string()));
    }

    let mut headers = OrderedHeaderMap::new();
    headers.insert(header::ACCEPT.as_str(), session.accept())?;
    headers.insert(header::USER_AGENT.as_str(), session.user_agent())?;
    headers.insert(
        header::ACCEPT_ENCODING.as_str(),
        &accept_encoding(session.content_decoders()),
    )?;

    let cookie = merge_cookies(prior_cookies, request.headers())?;
    if let Some(cookie) = cookie.as_deref() {
        headers.insert(header::COOKIE.as_str(), cookie)?;
    }

    for name in request.headers().keys() {
        if name == header::COOKIE {
            continue;
        }

        if name == header::HOST && protocol.is_multiplexed() {
            if let Some(host) = request.headers().get(name) {
                let host = host.to_str().map_err(|_| NetError::InvalidHeader)?;
                set_pseudo(&mut pseudo_headers, PseudoHeader::Authority, host);
            }
            continue;
        }

        for (i, value) in request.headers().get_all(name).iter().enumerate() {
            if i == 0 {
                headers.insert_typed(name.clone(), value.clone());
            } else {
                headers.append_typed(name.clone(), value.clone());
            }
        }
    }

    let mut content_length = None;
    let mut content_type = None;
    if !end_stream {
        let info = request
            .body()
            .map(RequestBody::inspect)
            .unwrap_or_else(|| RequestBody::Empty.inspect());

        if !headers.contains(header::CONTENT_LENGTH.as_str()) {
            if let Some(length) = info.length {
                headers.insert_typed(header::CONTENT_LENGTH, HeaderValue::from(length));
                content_length = Some(length);
            }
        }
        if !headers.contains(header::CONTENT_TYPE.as_str()) {
            if let Some(mime) = info.mime {
                headers.insert_typed(header::CONTENT_TYPE, HeaderValue::from_static(mime));
                content_type = Some(mime);
            }
        }
    }

    let accept_encoding = headers
        .get(header::ACCEPT_ENCODING.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    Ok(AssembledRequest {
        method,
        url: url.clone(),
        protocol,
        pseudo_headers,
        headers,
        end_stream,
        body: if end_stream { None } else { request.body().cloned() },
        content_length,
        content_type,
        cookie,
        accept_encoding,
    })
}

/// Jar entries first, then the request's own cookie values.
fn merge_cookies(prior: &[String], own: &HeaderMap) -> Result<Option<String>, NetError> {
    let mut entries: Vec<&str> = prior.iter().map(String::as_str).collect();
    for value in own.get_all(header::COOKIE) {
        entries.push(value.to_str().map_err(|_| NetError::InvalidHeader)?);
    }
    entries.retain(|e| !e.is_empty());

    if entries.is_empty() {
        Ok(None)
    } else {
        Ok(Some(entries.join("; ")))
    }
}

fn set_pseudo(pseudo: &mut [(PseudoHeader, String)], which: PseudoHeader, value: &str) {
    if let Some(slot) = pseudo.iter_mut().find(|(p, _)| *p == which) {
        slot.1 = value.to_string();
    }
}

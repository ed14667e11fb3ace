//! URL request job: the fetch loop and its redirect driver.
//!
//! Each iteration assembles headers, races one transport attempt against
//! cancellation and the chain deadline, then hands the outcome to
//! [`handle_response`], which either resolves or produces the next
//! [`Request`] with an updated [`ExecutionContext`].

use crate::base::deadline::Coordinator;
use crate::base::neterror::NetError;
use crate::http::assembler::assemble;
use crate::http::response::HttpResponse;
use crate::http::transaction::{HttpNetworkTransaction, TransportOutcome};
use crate::urlrequest::context::Session;
use crate::urlrequest::request::{RedirectMode, Request};
use http::header::{self, HeaderName};
use http::{Method, StatusCode};
use tokio::time::Instant;
use url::Url;

const SET_COOKIE2: HeaderName = HeaderName::from_static("set-cookie2");
const COOKIE2: HeaderName = HeaderName::from_static("cookie2");

/// Request headers that never follow a redirect to another origin.
const CROSS_ORIGIN_SENSITIVE: [HeaderName; 5] = [
    header::AUTHORIZATION,
    header::PROXY_AUTHORIZATION,
    header::COOKIE,
    COOKIE2,
    header::WWW_AUTHENTICATE,
];

/// 3xx statuses that are followed. 304 carries no location and is final.
const REDIRECT_STATUSES: [u16; 7] = [300, 301, 302, 303, 305, 307, 308];

pub fn is_redirect_status(status: StatusCode) -> bool {
    REDIRECT_STATUSES.contains(&status.as_u16())
}

/// Per-chain state threaded through redirect hops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    redirected: Vec<Url>,
    timeout_at: Option<Instant>,
}

impl ExecutionContext {
    /// Context for the first hop. The deadline is fixed here for the whole chain.
    pub fn first(request: &Request) -> Self {
        Self {
            redirected: Vec::new(),
            timeout_at: request.timeout().map(|t| Instant::now() + t),
        }
    }

    pub fn new(redirected: Vec<Url>, timeout_at: Option<Instant>) -> Self {
        Self {
            redirected,
            timeout_at,
        }
    }

    /// URLs already visited in this chain, oldest first.
    pub fn redirected(&self) -> &[Url] {
        &self.redirected
    }

    pub fn timeout_at(&self) -> Option<Instant> {
        self.timeout_at
    }

    pub fn is_first_hop(&self) -> bool {
        self.redirected.is_empty()
    }

    fn followed(&self, current: &Url) -> Self {
        let mut redirected = self.redirected.clone();
        redirected.push(current.clone());
        Self {
            redirected,
            timeout_at: self.timeout_at,
        }
    }
}

/// Result of interpreting one transport outcome.
#[derive(Debug)]
pub enum Outcome {
    Informational(HttpResponse),
    Response(HttpResponse),
    Continuation(Request, ExecutionContext),
}

/// Fail if visiting `target` after `visited` would repeat a URL.
fn check_cycle(visited: &[Url], target: &Url) -> Result<(), NetError> {
    match visited.iter().position(|u| u == target) {
        Some(pos) => {
            let mut chain = visited[pos..].to_vec();
            chain.push(target.clone());
            Err(NetError::RedirectionLoop { chain })
        }
        None => Ok(()),
    }
}

/// Interpret what the transport produced for `request`.
///
/// Cookies from the response are stored before any redirect policy is
/// applied, and cookie-setting headers never reach the caller.
pub fn handle_response(
    session: &dyn Session,
    request: &Request,
    context: &ExecutionContext,
    outcome: TransportOutcome,
) -> Result<Outcome, NetError> {
    let url = request.url();

    let response = match outcome {
        TransportOutcome::Informational(status, version) => {
            tracing::debug!(url = %url, status = status.as_u16(), "informational response");
            return Ok(Outcome::Informational(HttpResponse::informational(
                status,
                version,
                url.clone(),
            )));
        }
        TransportOutcome::Response(response) => response,
    };

    let (mut parts, body) = response.into_parts();
    let status = parts.status;

    let raw_location = parts
        .headers
        .get(header::LOCATION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
    let location = raw_location.as_deref().and_then(|l| url.join(l).ok());

    let set_cookie: Vec<String> = parts
        .headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_owned)
        .collect();
    if !set_cookie.is_empty() {
        session.cookie_jar().set_cookies(&set_cookie, url);
    }
    parts.headers.remove(header::SET_COOKIE);
    parts.headers.remove(SET_COOKIE2);

    tracing::debug!(
        url = %url,
        status = status.as_u16(),
        hop = context.redirected().len(),
        "response received"
    );

    let mode = request.redirect();
    if !is_redirect_status(status) || mode == RedirectMode::Manual {
        let redirected = mode != RedirectMode::Manual && !context.is_first_hop();
        let body = body.with_trailer_callback(request.on_trailers().cloned());
        let response = HttpResponse::new(parts, body, url.clone(), redirected)
            .with_content_decoders(session.content_decoders().to_vec())
            .with_integrity(request.integrity().map(str::to_owned));
        return Ok(Outcome::Response(response));
    }

    let next_context = context.followed(url);
    let chain = || next_context.redirected().to_vec();

    let Some(location) = location else {
        return Err(NetError::IllegalRedirect {
            url: url.clone(),
            location: raw_location,
            chain: chain(),
        });
    };

    if mode == RedirectMode::Error {
        return Err(NetError::Redirection {
            location,
            chain: chain(),
        });
    }

    let method = request.method();
    if *method != Method::GET && *method != Method::HEAD {
        return Err(NetError::RedirectionMethod {
            location,
            method: method.clone(),
            chain: chain(),
        });
    }

    check_cycle(next_context.redirected(), &location)?;

    if context.redirected().len() >= session.max_redirects() {
        return Err(NetError::TooManyRedirects { chain: chain() });
    }

    let mut next = request.clone_with_url(location);
    if session.strip_credentials_on_cross_origin() && url.origin() != next.url().origin() {
        for name in &CROSS_ORIGIN_SENSITIVE {
            next.remove_header(name.as_str());
        }
    }

    tracing::debug!(from = %url, to = %next.url(), status = status.as_u16(), "following redirect");
    Ok(Outcome::Continuation(next, next_context))
}

/// Drives one request through its redirect chain.
/// Equivalent to net::URLRequestHttpJob.
pub struct URLRequestHttpJob<'a> {
    session: &'a dyn Session,
    request: Request,
    context: ExecutionContext,
}

impl<'a> URLRequestHttpJob<'a> {
    pub fn new(session: &'a dyn Session, request: Request) -> Self {
        let context = ExecutionContext::first(&request);
        Self {
            session,
            request,
            context,
        }
    }

    /// Resume a chain with an existing context.
    pub fn with_context(
        session: &'a dyn Session,
        request: Request,
        context: ExecutionContext,
    ) -> Self {
        Self {
            session,
            request,
            context,
        }
    }

    pub async fn start(mut self) -> Result<HttpResponse, NetError> {
        loop {
            match self.attempt().await? {
                Outcome::Informational(response) | Outcome::Response(response) => {
                    return Ok(response)
                }
                Outcome::Continuation(next, context) => {
                    self.request = next;
                    self.context = context;
                }
            }
        }
    }

    /// One hop: assemble, race the transport, interpret.
    async fn attempt(&self) -> Result<Outcome, NetError> {
        let session = self.session;
        let request = &self.request;
        let url = request.url();

        check_cycle(self.context.redirected(), url)?;

        let cookies = session.cookie_jar().get_cookies(url);
        let assembled = assemble(session, request, &cookies)?;
        let mut transaction = HttpNetworkTransaction::new(assembled);

        let mut coordinator = Coordinator::setup(request.signal(), self.context.timeout_at())?;
        let outcome = coordinator
            .race(async {
                let mut connection = session.acquire_connection(url).await?;
                let outcome = transaction.start(&mut *connection).await?;
                session.release_connection(url, connection);
                Ok::<_, NetError>(outcome)
            })
            .await;

        if let Err(e) = &outcome {
            tracing::debug!(url = %url, error = %e, "attempt failed");
        }
        handle_response(session, request, &self.context, outcome?)
    }
}

/// Execute `request` in `session`, following redirects per its policy.
pub async fn fetch(session: &dyn Session, request: Request) -> Result<HttpResponse, NetError> {
    URLRequestHttpJob::new(session, request).start().await
}

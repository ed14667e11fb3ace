//! # unifetch
//!
//! A protocol-unifying HTTP fetch engine.
//!
//! One protocol-agnostic [`Request`] goes in; it is executed over HTTP/1.1
//! or HTTP/2 and comes back as the same [`HttpResponse`] shape either way.
//! The engine assembles wire headers from the request and session policy,
//! races each attempt against cancellation and a chain-wide deadline, and
//! follows redirects with cycle detection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unifetch::{Request, URLRequestContext};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), unifetch::NetError> {
//!     let context = URLRequestContext::new();
//!     let mut request = Request::new("http://example.com/")?;
//!     request.set_timeout(Duration::from_secs(10));
//!
//!     let response = context.fetch(request).await?;
//!     println!("Status: {} (redirected: {})", response.status(), response.redirected());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy, cancellation and deadline coordination
//! - [`cookies`] - Cookie jar capability and the in-memory store
//! - [`http`] - Header assembly, connections, transport, response types
//! - [`urlrequest`] - Request description, session capability, fetch loop

pub mod base;
pub mod cookies;
pub mod http;
pub mod urlrequest;

pub use base::abort::{AbortController, AbortSignal};
pub use base::neterror::NetError;
pub use crate::http::{HttpResponse, RequestBody, ResponseBody};
pub use urlrequest::{
    fetch, ContentDecoder, HttpProtocol, RedirectMode, Request, Session, URLRequestContext,
    URLRequestContextConfig,
};

//! Request description, session capability and the fetch loop.
//!
//! - [`Request`](request::Request): what to fetch and how to treat redirects
//! - [`Session`](context::Session): what the engine needs from its host
//! - [`URLRequestContext`](context::URLRequestContext): the configurable session
//! - [`fetch`](job::fetch): runs a request through its redirect chain

pub mod context;
pub mod job;
pub mod request;

pub use context::{
    ContentDecoder, HttpProtocol, Session, URLRequestContext, URLRequestContextConfig,
};
pub use job::fetch;
pub use request::{RedirectMode, Request};

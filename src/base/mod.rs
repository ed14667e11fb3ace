//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): the fixed error taxonomy, with
//!   Chromium-style integer codes
//! - [`AbortController`](abort::AbortController): caller-side cancellation
//! - [`Coordinator`](deadline::Coordinator): races a transport operation
//!   against cancellation and a deadline

pub mod abort;
pub mod context;
pub mod deadline;
pub mod neterror;

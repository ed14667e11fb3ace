//! HTTP request assembly, transport and response types.
//!
//! - [`assembler`]: turns a protocol-agnostic request into wire headers
//! - [`streamfactory`]: the connection capability and its hyper-backed h1/h2 implementation
//! - [`transaction`]: sends one assembled request and classifies the reply

pub mod assembler;
pub mod orderedheaders;
pub mod requestbody;
pub mod response;
pub mod responsebody;
pub mod streamfactory;
pub mod transaction;

// Re-exports for convenience
pub use assembler::AssembledRequest;
pub use requestbody::RequestBody;
pub use response::HttpResponse;
pub use responsebody::ResponseBody;

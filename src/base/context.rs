//! Ergonomic error context helpers.
//!
//! Converts IO errors from connection setup into context-rich `NetError`
//! variants that name the host and port being dialed.

use crate::base::neterror::NetError;
use std::io;
use std::sync::Arc;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use unifetch::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect((host, port)).await
    ///     .connection_context(host, port)?;
    /// // Error: "Connection to example.com:80 failed: connection refused"
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| match e.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            _ => NetError::ConnectionFailedTo {
                host: host.to_string(),
                port,
                source: Arc::new(e),
            },
        })
    }
}

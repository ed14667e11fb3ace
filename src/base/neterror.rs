use http::Method;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Boxed error type used by caller-supplied callbacks and pass-through transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Call termination
    #[error("The operation was aborted")]
    Aborted,
    #[error("Request timed out")]
    TimedOut,

    // Protocol errors
    #[error("Unsupported 100-continue response")]
    InformationalProtocol,
    #[error("Protocol upgrade is not supported")]
    UpgradeUnsupported,

    // Redirect errors. `chain` lists every URL visited so far, the failing hop last.
    #[error("Redirect response from {url} has no usable Location header")]
    IllegalRedirect {
        url: Url,
        location: Option<String>,
        chain: Vec<Url>,
    },
    #[error("URL got redirected to {location}")]
    Redirection { location: Url, chain: Vec<Url> },
    #[error("URL got redirected to {location}, which is not allowed for method {method}")]
    RedirectionMethod {
        location: Url,
        method: Method,
        chain: Vec<Url>,
    },
    #[error("Redirection loop detected: {}", format_chain(.chain))]
    RedirectionLoop { chain: Vec<Url> },
    #[error("Too many redirects: {}", format_chain(.chain))]
    TooManyRedirects { chain: Vec<Url> },

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("Transport error: {0}")]
    Transport(#[source] Arc<dyn std::error::Error + Send + Sync>),

    // Request Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Request body already consumed")]
    BodyAlreadyUsed,
    #[error("HTTP body error")]
    HttpBodyError,
}

fn format_chain(chain: &[Url]) -> String {
    chain
        .iter()
        .map(Url::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl NetError {
    /// Wrap an arbitrary transport failure without interpreting it.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        NetError::Transport(Arc::from(err.into()))
    }

    /// URLs visited before a redirect error, failing hop last.
    pub fn redirect_chain(&self) -> Option<&[Url]> {
        match self {
            NetError::IllegalRedirect { chain, .. }
            | NetError::Redirection { chain, .. }
            | NetError::RedirectionMethod { chain, .. }
            | NetError::RedirectionLoop { chain }
            | NetError::TooManyRedirects { chain } => Some(chain),
            _ => None,
        }
    }

    /// Whether this error came from the redirect machinery.
    pub fn is_redirect_error(&self) -> bool {
        matches!(
            self,
            NetError::IllegalRedirect { .. }
                | NetError::Redirection { .. }
                | NetError::RedirectionMethod { .. }
                | NetError::RedirectionLoop { .. }
                | NetError::TooManyRedirects { .. }
        )
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Aborted => -3,
            NetError::TimedOut => -7,

            NetError::ConnectionClosed => -100,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionFailed => -104,
            NetError::ConnectionFailedTo { .. } => -104,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::IllegalRedirect { .. } => -303,
            NetError::TooManyRedirects { .. } => -310,
            NetError::InvalidHeader => -320,
            NetError::UpgradeUnsupported => -322,
            NetError::HttpBodyError => -330,

            // Custom codes (-900 range)
            NetError::RedirectionLoop { .. } => -900,
            NetError::Redirection { .. } => -901,
            NetError::RedirectionMethod { .. } => -902,
            NetError::InformationalProtocol => -903,
            NetError::BodyAlreadyUsed => -904,
            NetError::Transport(_) => -999,
        }
    }
}

impl From<hyper::Error> for NetError {
    fn from(err: hyper::Error) -> Self {
        NetError::Transport(Arc::new(err))
    }
}

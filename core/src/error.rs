//! Error type for the request builder and its transport.
//!
//! # Design
//! Every failure a request can hit, from a malformed URL to a refused
//! connection, is parked in the request's terminal error slot and handed
//! back only by `Request::end`. `Send` therefore never fails, and callers
//! inspect a single `Result` once the exchange is over.
//!
//! Decode problems (a truncated or corrupt gzip stream) are deliberately
//! absent: `end` returns whatever bytes were decoded instead.

use std::error::Error as StdError;

/// Boxed error produced by a `Transport` implementation.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by `Request::end`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target URL could not be parsed.
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The parsed URL cannot be used as a request target.
    #[error("invalid request target {url:?}: {source}")]
    InvalidUri {
        url: String,
        #[source]
        source: http::uri::InvalidUri,
    },

    /// The method is not a valid HTTP token.
    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    /// A header name or value cannot be put on the wire.
    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    /// The JSON payload could not be serialized.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The network call failed: DNS, connect, TLS, timeout.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),

    /// The background thread for the call could not be started.
    #[error("failed to spawn request thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// `end` was called on a request that was never sent.
    #[error("request was never sent")]
    NotSent,

    /// The background call finished without publishing an outcome.
    #[error("request was canceled before completion")]
    Canceled,
}

impl Error {
    /// Wrap any transport-level failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Error::Transport(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::transport(io);
        assert_eq!(err.to_string(), "transport failure: refused");
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_url_mentions_input() {
        let source = url::Url::parse("://bad").unwrap_err();
        let err = Error::InvalidUrl {
            url: "://bad".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("invalid url \"://bad\""));
    }
}

//! Error types for metasync-transport.

use thiserror::Error;

use metasync_core::ManifestError;

/// All errors that can arise talking to a remote.
///
/// Variants for remote calls carry the URL or `bucket/key` involved.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not found: {location}")]
    NotFound { location: String },

    /// A non-404 HTTP status.
    #[error("HTTP {status} from {location}")]
    Status { location: String, status: u16 },

    #[error("SSL error talking to {location}: {message}")]
    Ssl { location: String, message: String },

    /// Connection refused/reset, DNS failure, open or read timeout.
    #[error("network error talking to {location}: {message}")]
    Network { location: String, message: String },

    #[error("cannot write to {location}: plain URLs are read-only")]
    ReadOnly { location: String },

    #[error("credentials are required to write to {location}")]
    MissingCredentials { location: String },

    #[error("invalid location `{input}`: {reason}")]
    InvalidLocation { input: String, reason: String },

    /// The server answered, but not with what the protocol promises.
    #[error("unexpected response from {location}: {message}")]
    BadResponse { location: String, message: String },

    #[error("gzip error for {location}: {source}")]
    Codec {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    TlsSetup(String),

    #[error("async runtime setup failed: {0}")]
    Runtime(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

/// How the retry loop treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Ssl,
    Network,
    Fatal,
}

impl TransportError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransportError::NotFound { .. } => ErrorClass::NotFound,
            TransportError::Ssl { .. } => ErrorClass::Ssl,
            TransportError::Network { .. } => ErrorClass::Network,
            TransportError::Status { status, .. } if is_transient_status(*status) => {
                ErrorClass::Network
            }
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> TransportError {
        TransportError::Status {
            location: "x".to_string(),
            status,
        }
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert_eq!(status(503).class(), ErrorClass::Network);
        assert_eq!(status(429).class(), ErrorClass::Network);
        assert_eq!(status(403).class(), ErrorClass::Fatal);
        assert_eq!(status(400).class(), ErrorClass::Fatal);
    }

    #[test]
    fn messages_carry_the_location() {
        let err = TransportError::Network {
            location: "https://mirror.example/a.txt".to_string(),
            message: "timed out reading response".to_string(),
        };
        assert!(err.to_string().contains("https://mirror.example/a.txt"));
    }
}

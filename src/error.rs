//! Error types for the AMI client

use std::io;

/// Result alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors produced by the AMI client.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AmiError {
    /// The opening banner did not identify an Asterisk Call Manager endpoint.
    #[error("server is not an AMI endpoint: {banner:?}")]
    NotAmi {
        /// Banner line the server actually sent.
        banner: String,
    },

    /// Action submitted with empty parameters or without an `Action` key.
    #[error("invalid action parameters: missing Action key")]
    InvalidParams,

    /// A header line inside a message block had no `name: value` shape.
    #[error("invalid header line: {line:?}")]
    InvalidHeader {
        /// The offending line.
        line: String,
    },

    /// A header line exceeded [`MAX_LINE_SIZE`](crate::constants::MAX_LINE_SIZE).
    #[error("header line exceeds maximum length")]
    LineTooLong,

    /// The server rejected the `Login` action.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Server-provided `Message` header text.
        message: String,
    },

    /// Clean end-of-stream while reading from the server.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// TLS configuration or handshake failure.
    #[error("TLS error: {message}")]
    Tls {
        /// Description of the failure.
        message: String,
    },

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AmiError {
    pub(crate) fn tls(message: impl Into<String>) -> Self {
        AmiError::Tls {
            message: message.into(),
        }
    }

    /// Best-effort copy for delivering the same failure on two paths
    /// (`io::Error` is not `Clone`, so the kind and message are preserved).
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            AmiError::NotAmi { banner } => AmiError::NotAmi {
                banner: banner.clone(),
            },
            AmiError::InvalidParams => AmiError::InvalidParams,
            AmiError::InvalidHeader { line } => AmiError::InvalidHeader { line: line.clone() },
            AmiError::LineTooLong => AmiError::LineTooLong,
            AmiError::AuthenticationFailed { message } => AmiError::AuthenticationFailed {
                message: message.clone(),
            },
            AmiError::ConnectionClosed => AmiError::ConnectionClosed,
            AmiError::Tls { message } => AmiError::Tls {
                message: message.clone(),
            },
            AmiError::Io(e) => AmiError::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }

    /// Whether this error is a network-class failure: connection dropped,
    /// reset, aborted, refused, or end-of-stream. The background reader routes
    /// these to the network-error stream and parks until a reconnect; anything
    /// else goes to the general error stream.
    pub fn is_network(&self) -> bool {
        match self {
            AmiError::ConnectionClosed => true,
            AmiError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_classification() {
        assert!(AmiError::ConnectionClosed.is_network());
        assert!(AmiError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).is_network());
        assert!(AmiError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)).is_network());
        assert!(!AmiError::Io(io::Error::from(io::ErrorKind::InvalidData)).is_network());
        assert!(!AmiError::InvalidParams.is_network());
        assert!(!AmiError::InvalidHeader {
            line: "garbage".to_string()
        }
        .is_network());
    }

    #[test]
    fn duplicate_preserves_kind_and_message() {
        let original = AmiError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        let copy = original.duplicate();
        assert!(copy.is_network());
        assert!(copy
            .to_string()
            .contains("reset by peer"));

        assert!(matches!(
            AmiError::ConnectionClosed.duplicate(),
            AmiError::ConnectionClosed
        ));
    }

    #[test]
    fn display_messages() {
        let err = AmiError::NotAmi {
            banner: "SSH-2.0-OpenSSH".to_string(),
        };
        assert!(err
            .to_string()
            .contains("not an AMI endpoint"));

        let err = AmiError::AuthenticationFailed {
            message: "Authentication failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "authentication failed: Authentication failed"
        );
    }
}

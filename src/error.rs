use lodestone_net::{ProtoError, ProtocolState};

/// Failures of a single client connection.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("Networking error - {0} (ce:io)")]
    Io(#[from] std::io::Error),
    #[error("Protocol error - {0} (ce:pe)")]
    Protocol(#[from] ProtoError),
    #[error("Illegal state transition {} -> {} (ce:st)", .from.as_str(), .to.as_str())]
    InvalidTransition {
        from: ProtocolState,
        to: ProtocolState,
    },
    #[error("Connection closed (ce:cl)")]
    Closed,
}

/// Reasons a handshake ends without a status or login outcome.
#[derive(thiserror::Error, Debug)]
pub enum HandshakeError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("Key pair generation failed - {0} (he:kg)")]
    KeyGeneration(#[source] anyhow::Error),
    #[error("Status payload unavailable - {0} (he:sp)")]
    Status(#[source] anyhow::Error),
    #[error("Decryption failed - {0} (he:dc)")]
    Decrypt(#[from] rsa::Error),
    #[error("Verify token mismatch (he:vt)")]
    VerifyTokenMismatch,
    #[error("Shared secret must be 16 bytes, got {0} (he:ss)")]
    BadSharedSecret(usize),
    #[error("Request timeout (he:to)")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl HandshakeError {
    /// Short label for metrics and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::KeyGeneration(_) => "keygen",
            Self::Status(_) => "status",
            Self::Decrypt(_) | Self::VerifyTokenMismatch | Self::BadSharedSecret(_) => {
                "encryption"
            }
            Self::Timeout(_) => "timeout",
        }
    }
}

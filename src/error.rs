use crate::terminal::SdkError;
use crate::types::{BackendError, ReaderId};

/// User-facing replacement for low-level transport failures.
pub const NETWORK_UNREACHABLE: &str = "make sure you're connected to internet.";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed: {error}")]
    Backend {
        operation: &'static str,
        error: BackendError,
    },
    #[error("Terminal session is not initialized")]
    NotInitialized,
    #[error("No reader connected")]
    NoReaderConnected,
    #[error("Reader {0} is not in the current discovery set")]
    UnknownReader(ReaderId),
    #[error("Failed to discover readers: {0}")]
    Discovery(SdkError),
    #[error("Failed to connect reader: {0}")]
    Connect(SdkError),
}

impl Error {
    /// True for failures below the HTTP layer (DNS, refused connection, timeout).
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Message suitable for showing to the operator.
    ///
    /// Backend errors surface the backend's own message verbatim; transport
    /// failures collapse into [`NETWORK_UNREACHABLE`].
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend { error, .. } => error.message.clone(),
            Self::Discovery(e) | Self::Connect(e) => e.message.clone(),
            _ if self.is_network() => NETWORK_UNREACHABLE.to_owned(),
            other => other.to_string(),
        }
    }
}

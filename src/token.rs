use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::backend::PaymentBackend;
use crate::error::{Error, NETWORK_UNREACHABLE};
use crate::events::{Event, EventBus};
use crate::terminal::TokenSource;
use crate::types::BackendError;

/// Fetches connection tokens for the terminal SDK.
///
/// Every call goes to the backend; tokens are never cached. Failures are
/// reported twice: as [`Event::ConnectionTokenCreationError`] for the UI,
/// and as the returned string so the SDK handshake always completes.
pub struct ConnectionTokenProvider<B> {
    backend: Arc<B>,
    bus: EventBus,
}

impl<B: PaymentBackend> ConnectionTokenProvider<B> {
    #[must_use]
    pub fn new(backend: Arc<B>, bus: EventBus) -> Self {
        Self { backend, bus }
    }

    /// Returns the token secret, or a human-readable failure message.
    pub async fn fetch_connection_token(&self) -> String {
        match self.backend.create_connection_token().await {
            Ok(token) => token.secret,
            Err(e) => {
                let error = match e {
                    Error::Backend { error, .. } => error,
                    other if other.is_network() => BackendError::new(NETWORK_UNREACHABLE),
                    other => BackendError::new(other.to_string()),
                };
                tracing::error!(error = %error, "Connection token creation failed");
                let message = error.message.clone();
                self.bus.publish(Event::ConnectionTokenCreationError(error));
                message
            }
        }
    }
}

impl<B: PaymentBackend> TokenSource for ConnectionTokenProvider<B> {
    fn fetch_token(&self) -> Pin<Box<dyn Future<Output = String> + Send + '_>> {
        Box::pin(self.fetch_connection_token())
    }
}

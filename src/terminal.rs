//! Terminal SDK seam.
//!
//! The vendor SDK is consumer-provided: implement [`TerminalConnector`] to
//! create an SDK session and [`TerminalSdk`] for the calls made on it. Every
//! call returns either its success payload or an [`SdkError`]; adapters set
//! the error's [`SdkErrorKind`] from the SDK's own error code at the point
//! the error is first observed.
//!
//! ```rust,ignore
//! impl TerminalSdk for MyReaderBridge {
//!     async fn collect_payment_method(
//!         &self,
//!         client_secret: &ClientSecret,
//!     ) -> Result<PaymentIntent, SdkError> {
//!         self.bridge.collect(client_secret.expose()).await.map_err(|e| match e.code() {
//!             "reader_communication_error" => SdkError::reader_communication(e.message()),
//!             _ => SdkError::new(SdkErrorKind::Other, e.message()),
//!         })
//!     }
//!     // ...
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::DiscoveryConfig;
use crate::context::TerminalContext;
use crate::events::{Event, EventBus};
use crate::types::{ClientSecret, PaymentIntent, Reader};

/// Failure class of an SDK error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SdkErrorKind {
    /// The reader itself could not be reached; the session is unusable.
    ReaderCommunication,
    /// The payment method was refused.
    Declined,
    /// The SDK could not reach its own backend.
    Network,
    Other,
}

/// Error reported by a terminal SDK call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SdkError {
    pub kind: SdkErrorKind,
    pub code: Option<String>,
    pub message: String,
}

impl SdkError {
    #[must_use]
    pub fn new(kind: SdkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn reader_communication(message: impl Into<String>) -> Self {
        Self::new(SdkErrorKind::ReaderCommunication, message)
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn is_reader_communication(&self) -> bool {
        self.kind == SdkErrorKind::ReaderCommunication
    }
}

/// Failed `process_payment` call: the error plus the intent snapshot the
/// SDK returned alongside it, if any.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct ProcessPaymentError {
    pub error: SdkError,
    pub payment_intent: Option<PaymentIntent>,
}

impl ProcessPaymentError {
    #[must_use]
    pub fn new(error: SdkError, payment_intent: Option<PaymentIntent>) -> Self {
        Self {
            error,
            payment_intent,
        }
    }
}

/// Payload of a successful discovery call. `None` means the SDK answered
/// without a reader list at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DiscoverResult {
    #[serde(default)]
    pub discovered_readers: Option<Vec<Reader>>,
}

impl DiscoverResult {
    #[must_use]
    pub fn readers(readers: Vec<Reader>) -> Self {
        Self {
            discovered_readers: Some(readers),
        }
    }
}

/// Calls available on an initialized SDK session.
pub trait TerminalSdk: Send + Sync + 'static {
    fn discover_readers(
        &self,
        config: &DiscoveryConfig,
    ) -> impl Future<Output = Result<DiscoverResult, SdkError>> + Send;

    /// Returns the connected reader.
    fn connect_reader(
        &self,
        reader: &Reader,
    ) -> impl Future<Output = Result<Reader, SdkError>> + Send;

    fn disconnect_reader(
        &self,
        reader: &Reader,
    ) -> impl Future<Output = Result<(), SdkError>> + Send;

    /// Wait for the payer to present a card; returns the updated intent.
    fn collect_payment_method(
        &self,
        client_secret: &ClientSecret,
    ) -> impl Future<Output = Result<PaymentIntent, SdkError>> + Send;

    fn process_payment(
        &self,
        intent: &PaymentIntent,
    ) -> impl Future<Output = Result<PaymentIntent, ProcessPaymentError>> + Send;
}

/// Creates SDK sessions.
pub trait TerminalConnector: Send + Sync + 'static {
    type Sdk: TerminalSdk;

    /// Build a session. The SDK calls `hooks` for connection tokens and to
    /// report readers that drop on their own.
    fn create(
        &self,
        hooks: TerminalHooks,
    ) -> impl Future<Output = Result<Self::Sdk, SdkError>> + Send;
}

/// Object-safe source of connection tokens (needed for `Arc<dyn>`).
pub trait TokenSource: Send + Sync {
    /// Always resolves; failures resolve to a human-readable message.
    fn fetch_token(&self) -> Pin<Box<dyn Future<Output = String> + Send + '_>>;
}

/// Callbacks handed to the SDK at creation time.
#[derive(Clone)]
pub struct TerminalHooks {
    tokens: Arc<dyn TokenSource>,
    context: Arc<TerminalContext>,
    bus: EventBus,
}

impl TerminalHooks {
    pub(crate) fn new(
        tokens: Arc<dyn TokenSource>,
        context: Arc<TerminalContext>,
        bus: EventBus,
    ) -> Self {
        Self {
            tokens,
            context,
            bus,
        }
    }

    /// A fresh token on every call.
    pub async fn fetch_connection_token(&self) -> String {
        self.tokens.fetch_token().await
    }

    /// The reader went away without being asked to. Invalidates the session
    /// and publishes [`Event::ConnectionLost`].
    pub fn reader_disconnected(&self) {
        let reader = self.context.clear_connected();
        tracing::warn!(
            reader_id = ?reader.as_ref().map(|r| &r.id),
            "Reader disconnected unexpectedly"
        );
        self.bus.publish(Event::ConnectionLost);
    }
}

impl std::fmt::Debug for TerminalHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalHooks").finish_non_exhaustive()
    }
}

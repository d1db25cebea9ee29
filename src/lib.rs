#![doc = include_str!("../README.md")]

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod intent;
pub mod orchestrator;
pub mod pos;
pub mod session;
pub mod terminal;
pub mod token;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
#[cfg(feature = "http")]
pub use backend::BackendClient;
pub use backend::PaymentBackend;
pub use config::{BackendConfig, DiscoveryConfig, PosConfig};
pub use context::{PaymentPhase, SdkPhase, TerminalContext};
pub use error::Error;
pub use events::{Event, EventBus, SubscriptionId, Topic};
pub use intent::IntentLifecycleClient;
pub use orchestrator::{
    FailureKind, PaymentFailure, PaymentOrchestrator, PaymentOutcome, PaymentStage, PaymentState,
    Rejection, RetryBudget,
};
pub use pos::PointOfSale;
pub use session::ReaderSessionManager;
pub use terminal::{
    DiscoverResult, ProcessPaymentError, SdkError, SdkErrorKind, TerminalConnector,
    TerminalHooks, TerminalSdk, TokenSource,
};
pub use token::ConnectionTokenProvider;
pub use types::{
    Amount, BackendError, ClientSecret, ConnectionToken, IntentStatus, PaymentIntent,
    PaymentIntentId, Reader, ReaderId, Session,
};

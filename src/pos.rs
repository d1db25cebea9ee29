use std::sync::Arc;

use crate::backend::PaymentBackend;
use crate::config::PosConfig;
use crate::context::TerminalContext;
use crate::error::Error;
use crate::events::{Event, EventBus, SubscriptionId, Topic};
use crate::intent::IntentLifecycleClient;
use crate::orchestrator::{PaymentOrchestrator, PaymentOutcome};
use crate::session::ReaderSessionManager;
use crate::terminal::{TerminalConnector, TokenSource};
use crate::token::ConnectionTokenProvider;
use crate::types::{Reader, ReaderId, Session};

pub const NOTICE_CONNECTION_LOST: &str =
    "Connection lost, make sure the reader and the PC are connected to internet";

/// Operator-facing controller wiring the token provider, the reader session
/// and the payment orchestrator around one [`TerminalContext`].
///
/// The SDK session is not created until the first call that needs it
/// (usually [`list_readers`](Self::list_readers)).
pub struct PointOfSale<C: TerminalConnector, B> {
    config: PosConfig,
    context: Arc<TerminalContext>,
    bus: EventBus,
    session: Arc<ReaderSessionManager<C>>,
    orchestrator: PaymentOrchestrator<C, B>,
    subscriptions: Vec<SubscriptionId>,
}

impl<C: TerminalConnector, B: PaymentBackend> PointOfSale<C, B> {
    #[must_use]
    pub fn new(config: PosConfig, connector: C, backend: B) -> Self {
        let backend = Arc::new(backend);
        let bus = EventBus::new();
        let context = Arc::new(TerminalContext::new());

        let tokens: Arc<dyn TokenSource> = Arc::new(ConnectionTokenProvider::new(
            Arc::clone(&backend),
            bus.clone(),
        ));
        let session = Arc::new(ReaderSessionManager::new(
            connector,
            tokens,
            Arc::clone(&context),
            bus.clone(),
        ));
        let orchestrator = PaymentOrchestrator::new(
            Arc::clone(&session),
            IntentLifecycleClient::new(backend),
            Arc::clone(&context),
            bus.clone(),
        );

        let subscriptions = vec![
            {
                let context = Arc::clone(&context);
                bus.subscribe(Topic::ConnectionLost, move |_| {
                    context.push_notice(NOTICE_CONNECTION_LOST);
                })
            },
            {
                let context = Arc::clone(&context);
                bus.subscribe(Topic::ConnectionTokenCreationError, move |event| {
                    if let Event::ConnectionTokenCreationError(error) = event {
                        context.push_notice(error.message.clone());
                    }
                })
            },
        ];

        Self {
            config,
            context,
            bus,
            session,
            orchestrator,
            subscriptions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PosConfig {
        &self.config
    }

    #[must_use]
    pub fn context(&self) -> &Arc<TerminalContext> {
        &self.context
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn session(&self) -> &Arc<ReaderSessionManager<C>> {
        &self.session
    }

    /// Disconnect the current reader, if any, then run a fresh discovery.
    ///
    /// # Errors
    ///
    /// See [`ReaderSessionManager::discover`].
    pub async fn list_readers(&self) -> Result<Vec<Reader>, Error> {
        if self.context.connected_reader().is_some() {
            self.session.disconnect().await?;
        }
        self.session.discover(self.config.discovery()).await
    }

    /// Connect a reader from the latest discovery.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownReader`] if `id` is not in the current discovery set;
    /// otherwise see [`ReaderSessionManager::connect`].
    pub async fn connect_reader(&self, id: &ReaderId) -> Result<Session, Error> {
        let reader = self
            .context
            .find_discovered(id)
            .ok_or_else(|| Error::UnknownReader(id.clone()))?;
        self.session.connect(&reader).await
    }

    /// # Errors
    ///
    /// [`Error::NoReaderConnected`] if nothing is connected.
    pub async fn disconnect_reader(&self) -> Result<(), Error> {
        self.session.disconnect().await
    }

    /// Take a payment; see [`PaymentOrchestrator::pay`].
    pub async fn pay(&self, amount: &str) -> PaymentOutcome {
        self.orchestrator.pay(amount).await
    }
}

impl<C: TerminalConnector, B> Drop for PointOfSale<C, B> {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

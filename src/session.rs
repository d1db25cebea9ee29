use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::DiscoveryConfig;
use crate::context::{SdkPhase, TerminalContext};
use crate::error::Error;
use crate::events::EventBus;
use crate::terminal::{
    SdkError, SdkErrorKind, TerminalConnector, TerminalHooks, TerminalSdk, TokenSource,
};
use crate::types::{Reader, Session};

/// Owns the single terminal SDK session.
///
/// The SDK is created lazily: [`discover`](Self::discover) and
/// [`connect`](Self::connect) (re)run [`initialize`](Self::initialize), so a
/// failed start-up is retried on the next operator action.
pub struct ReaderSessionManager<C: TerminalConnector> {
    connector: C,
    tokens: Arc<dyn TokenSource>,
    context: Arc<TerminalContext>,
    bus: EventBus,
    sdk: Mutex<Option<Arc<C::Sdk>>>,
}

impl<C: TerminalConnector> ReaderSessionManager<C> {
    #[must_use]
    pub fn new(
        connector: C,
        tokens: Arc<dyn TokenSource>,
        context: Arc<TerminalContext>,
        bus: EventBus,
    ) -> Self {
        Self {
            connector,
            tokens,
            context,
            bus,
            sdk: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<TerminalContext> {
        &self.context
    }

    /// Create the SDK session if there is none yet. Concurrent callers wait
    /// for the first attempt. Failures are logged and leave the manager
    /// uninitialized.
    pub async fn initialize(&self) {
        let mut slot = self.sdk.lock().await;
        if slot.is_some() {
            return;
        }

        self.context.set_sdk_phase(SdkPhase::Initializing);
        let hooks = TerminalHooks::new(
            Arc::clone(&self.tokens),
            Arc::clone(&self.context),
            self.bus.clone(),
        );
        match self.connector.create(hooks).await {
            Ok(sdk) => {
                *slot = Some(Arc::new(sdk));
                self.context.set_sdk_phase(SdkPhase::Ready);
                tracing::info!("Terminal SDK session ready");
            }
            Err(e) => {
                self.context.set_sdk_phase(SdkPhase::Uninitialized);
                tracing::warn!(error = %e, "Terminal SDK initialization failed");
            }
        }
    }

    /// The live SDK session, if initialized.
    pub async fn sdk(&self) -> Option<Arc<C::Sdk>> {
        self.sdk.lock().await.clone()
    }

    async fn ready_sdk(&self) -> Result<Arc<C::Sdk>, Error> {
        self.initialize().await;
        self.sdk().await.ok_or(Error::NotInitialized)
    }

    /// Discover readers. The previous discovery set is discarded before the
    /// call, whatever its outcome.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if the SDK cannot be created,
    /// [`Error::Discovery`] if the SDK reports an error or no result.
    pub async fn discover(&self, config: &DiscoveryConfig) -> Result<Vec<Reader>, Error> {
        let sdk = self.ready_sdk().await?;
        self.context.replace_discovered(Vec::new());

        let result = sdk.discover_readers(config).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to discover readers");
            Error::Discovery(e)
        })?;
        let readers = result.discovered_readers.ok_or_else(|| {
            tracing::warn!("Discovery returned no result");
            Error::Discovery(SdkError::new(
                SdkErrorKind::Other,
                "Reader discovery returned no result",
            ))
        })?;

        if readers.is_empty() {
            tracing::info!("No available readers");
        } else {
            tracing::info!(count = readers.len(), "Readers discovered");
        }
        self.context.replace_discovered(readers.clone());
        Ok(readers)
    }

    /// Connect `reader`, which must belong to the current discovery set. A
    /// different reader still connected is disconnected first.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownReader`] for readers from an older discovery,
    /// [`Error::Connect`] if the SDK refuses the connection.
    pub async fn connect(&self, reader: &Reader) -> Result<Session, Error> {
        let sdk = self.ready_sdk().await?;
        if self.context.find_discovered(&reader.id).is_none() {
            return Err(Error::UnknownReader(reader.id.clone()));
        }

        if let Some(current) = self.context.connected_reader() {
            if current.id == reader.id {
                return Ok(self.context.session());
            }
            self.disconnect_from(&sdk, &current).await;
        }

        let connected = sdk.connect_reader(reader).await.map_err(|e| {
            tracing::warn!(reader_id = %reader.id, error = %e, "Failed to connect reader");
            Error::Connect(e)
        })?;
        tracing::info!(reader_id = %connected.id, label = %connected.label, "Connected to reader");
        self.context.set_connected(connected);
        Ok(self.context.session())
    }

    /// Disconnect the connected reader. SDK failures are logged only; the
    /// session reads as disconnected afterwards either way.
    ///
    /// # Errors
    ///
    /// [`Error::NoReaderConnected`] if nothing is connected.
    pub async fn disconnect(&self) -> Result<(), Error> {
        let reader = self
            .context
            .connected_reader()
            .ok_or(Error::NoReaderConnected)?;
        match self.sdk().await {
            Some(sdk) => self.disconnect_from(&sdk, &reader).await,
            None => {
                self.context.clear_connected();
            }
        }
        Ok(())
    }

    async fn disconnect_from(&self, sdk: &C::Sdk, reader: &Reader) {
        if let Err(e) = sdk.disconnect_reader(reader).await {
            tracing::warn!(reader_id = %reader.id, error = %e, "Failed to disconnect reader");
        } else {
            tracing::info!(reader_id = %reader.id, "Disconnected from reader");
        }
        self.context.clear_connected();
    }

    /// Forget the connected reader and the discovered set without talking to
    /// the SDK. Used once the reader is known to be unreachable.
    pub fn reset(&self) {
        self.context.restore_default();
        tracing::info!("Reader session reset");
    }
}

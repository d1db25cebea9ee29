//! Scripted doubles for the backend and the terminal SDK.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::PaymentBackend;
use crate::config::DiscoveryConfig;
use crate::error::Error;
use crate::terminal::{
    DiscoverResult, ProcessPaymentError, SdkError, SdkErrorKind, TerminalConnector,
    TerminalHooks, TerminalSdk,
};
use crate::types::{
    Amount, BackendError, ClientSecret, ConnectionToken, IntentStatus, PaymentIntent,
    PaymentIntentId, Reader,
};

pub(crate) const READER_COMM_FAILURE: &str = "Could not communicate with the Reader.";

pub(crate) fn intent(id: &str, status: IntentStatus) -> PaymentIntent {
    PaymentIntent::new(id, format!("{id}_secret_test"), status, 1000)
}

pub(crate) fn declined(id: &str) -> ProcessPaymentError {
    ProcessPaymentError::new(
        SdkError::new(SdkErrorKind::Declined, "Your card was declined.").with_code("card_declined"),
        Some(intent(id, IntentStatus::RequiresPaymentMethod)),
    )
}

pub(crate) fn needs_confirmation(id: &str) -> ProcessPaymentError {
    ProcessPaymentError::new(
        SdkError::new(SdkErrorKind::Other, "Confirmation required."),
        Some(intent(id, IntentStatus::RequiresConfirmation)),
    )
}

// ── Backend ────────────────────────────────────────────────────────

#[derive(Default)]
struct BackendScript {
    token_error: Option<BackendError>,
    create_error: Option<BackendError>,
    cancel_error: Option<BackendError>,
    created: Vec<String>,
    canceled: Vec<PaymentIntentId>,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    tokens: AtomicUsize,
    script: Mutex<BackendScript>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_tokens(&self, error: BackendError) {
        self.script.lock().unwrap().token_error = Some(error);
    }

    pub(crate) fn fail_creates(&self, error: BackendError) {
        self.script.lock().unwrap().create_error = Some(error);
    }

    pub(crate) fn fail_cancels(&self, error: BackendError) {
        self.script.lock().unwrap().cancel_error = Some(error);
    }

    pub(crate) fn token_requests(&self) -> usize {
        self.tokens.load(Ordering::SeqCst)
    }

    pub(crate) fn created_amounts(&self) -> Vec<String> {
        self.script.lock().unwrap().created.clone()
    }

    pub(crate) fn canceled(&self) -> Vec<PaymentIntentId> {
        self.script.lock().unwrap().canceled.clone()
    }
}

impl PaymentBackend for FakeBackend {
    async fn create_connection_token(&self) -> Result<ConnectionToken, Error> {
        let n = self.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        match self.script.lock().unwrap().token_error.clone() {
            Some(error) => Err(Error::Backend {
                operation: "create connection token",
                error,
            }),
            None => Ok(ConnectionToken {
                secret: format!("pst_test_{n}"),
            }),
        }
    }

    async fn create_payment_intent(&self, amount: &Amount) -> Result<PaymentIntent, Error> {
        let mut script = self.script.lock().unwrap();
        script.created.push(amount.as_str().to_owned());
        if let Some(error) = script.create_error.clone() {
            return Err(Error::Backend {
                operation: "create payment intent",
                error,
            });
        }
        let id = format!("pi_{}", script.created.len());
        Ok(intent(&id, IntentStatus::RequiresPaymentMethod))
    }

    async fn cancel_payment_intent(&self, id: &PaymentIntentId) -> Result<PaymentIntent, Error> {
        let mut script = self.script.lock().unwrap();
        script.canceled.push(id.clone());
        match script.cancel_error.clone() {
            Some(error) => Err(Error::Backend {
                operation: "cancel payment intent",
                error,
            }),
            None => Ok(intent(&id.0, IntentStatus::Canceled)),
        }
    }
}

// ── Terminal SDK ───────────────────────────────────────────────────

#[derive(Default)]
struct SdkScript {
    discoveries: VecDeque<Result<DiscoverResult, SdkError>>,
    connect_error: Option<SdkError>,
    disconnect_error: Option<SdkError>,
    collects: VecDeque<Result<PaymentIntent, SdkError>>,
    processes: VecDeque<Result<PaymentIntent, ProcessPaymentError>>,
    drop_reader_on_collect: bool,
    hooks: Option<TerminalHooks>,
    discover_calls: usize,
    connected: Vec<Reader>,
    disconnected: Vec<Reader>,
    collect_calls: usize,
    process_calls: usize,
}

/// Scripted SDK. Clones share one script so tests keep a handle after the
/// connector hands a copy to the session manager.
#[derive(Clone, Default)]
pub(crate) struct FakeSdk {
    script: Arc<Mutex<SdkScript>>,
}

impl FakeSdk {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_discovery(&self, result: Result<DiscoverResult, SdkError>) {
        self.script.lock().unwrap().discoveries.push_back(result);
    }

    pub(crate) fn fail_connect(&self, error: SdkError) {
        self.script.lock().unwrap().connect_error = Some(error);
    }

    pub(crate) fn fail_disconnect(&self, error: SdkError) {
        self.script.lock().unwrap().disconnect_error = Some(error);
    }

    pub(crate) fn push_collect(&self, result: Result<PaymentIntent, SdkError>) {
        self.script.lock().unwrap().collects.push_back(result);
    }

    pub(crate) fn push_process(&self, result: Result<PaymentIntent, ProcessPaymentError>) {
        self.script.lock().unwrap().processes.push_back(result);
    }

    /// Fire the unexpected-disconnect hook from inside the next collect call.
    pub(crate) fn drop_reader_on_collect(&self) {
        self.script.lock().unwrap().drop_reader_on_collect = true;
    }

    pub(crate) fn hooks(&self) -> Option<TerminalHooks> {
        self.script.lock().unwrap().hooks.clone()
    }

    pub(crate) fn discover_calls(&self) -> usize {
        self.script.lock().unwrap().discover_calls
    }

    pub(crate) fn connected(&self) -> Vec<Reader> {
        self.script.lock().unwrap().connected.clone()
    }

    pub(crate) fn disconnected(&self) -> Vec<Reader> {
        self.script.lock().unwrap().disconnected.clone()
    }

    pub(crate) fn collect_calls(&self) -> usize {
        self.script.lock().unwrap().collect_calls
    }

    pub(crate) fn process_calls(&self) -> usize {
        self.script.lock().unwrap().process_calls
    }
}

impl TerminalSdk for FakeSdk {
    async fn discover_readers(&self, _config: &DiscoveryConfig) -> Result<DiscoverResult, SdkError> {
        let mut script = self.script.lock().unwrap();
        script.discover_calls += 1;
        script.discoveries.pop_front().unwrap_or_else(|| {
            Ok(DiscoverResult::readers(vec![
                Reader::new("tmr_sim_1", "Simulated reader 1"),
                Reader::new("tmr_sim_2", "Simulated reader 2"),
            ]))
        })
    }

    async fn connect_reader(&self, reader: &Reader) -> Result<Reader, SdkError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.connect_error.clone() {
            return Err(error);
        }
        script.connected.push(reader.clone());
        Ok(reader.clone())
    }

    async fn disconnect_reader(&self, reader: &Reader) -> Result<(), SdkError> {
        let mut script = self.script.lock().unwrap();
        script.disconnected.push(reader.clone());
        match script.disconnect_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn collect_payment_method(
        &self,
        client_secret: &ClientSecret,
    ) -> Result<PaymentIntent, SdkError> {
        let (result, hooks) = {
            let mut script = self.script.lock().unwrap();
            script.collect_calls += 1;
            let hooks = if std::mem::take(&mut script.drop_reader_on_collect) {
                script.hooks.clone()
            } else {
                None
            };
            let result = script.collects.pop_front().unwrap_or_else(|| {
                let secret = client_secret.expose();
                let id = secret.split("_secret").next().unwrap_or(secret);
                Ok(intent(id, IntentStatus::RequiresConfirmation))
            });
            (result, hooks)
        };
        if let Some(hooks) = hooks {
            hooks.reader_disconnected();
        }
        result
    }

    async fn process_payment(
        &self,
        payment_intent: &PaymentIntent,
    ) -> Result<PaymentIntent, ProcessPaymentError> {
        let mut script = self.script.lock().unwrap();
        script.process_calls += 1;
        script
            .processes
            .pop_front()
            .unwrap_or_else(|| Ok(payment_intent.clone().with_status(IntentStatus::Succeeded)))
    }
}

pub(crate) struct FakeConnector {
    sdk: FakeSdk,
    failures_left: AtomicUsize,
    creates: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn new(sdk: FakeSdk) -> Self {
        Self {
            sdk,
            failures_left: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` create calls fail.
    pub(crate) fn failing(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl TerminalConnector for FakeConnector {
    type Sdk = FakeSdk;

    async fn create(&self, hooks: TerminalHooks) -> Result<FakeSdk, SdkError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SdkError::new(SdkErrorKind::Network, "Failed to fetch"));
        }
        self.sdk.script.lock().unwrap().hooks = Some(hooks);
        Ok(self.sdk.clone())
    }
}

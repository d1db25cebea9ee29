//! Shared session, payment and UI-affordance state.
//!
//! One [`TerminalContext`] is created per point of sale and handed to the
//! session manager and the orchestrator. All access goes through short
//! critical sections that never span an await, so synchronous event
//! handlers can update it directly.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{Reader, ReaderId, Session};

/// Initialization phase of the terminal SDK session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SdkPhase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

/// Coarse position of the in-flight payment, for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaymentPhase {
    #[default]
    Idle,
    IntentCreated,
    Collecting,
    Collected,
    Processing,
    RequiresRetryMethod,
    RequiresConfirmation,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Default)]
struct State {
    sdk_phase: SdkPhase,
    connected_reader: Option<Reader>,
    discovered: Vec<Reader>,
    pay_enabled: bool,
    payment_in_flight: bool,
    payment_phase: PaymentPhase,
    status: Option<String>,
    notices: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TerminalContext {
    state: Mutex<State>,
}

impl TerminalContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Session ────────────────────────────────────────────────────

    #[must_use]
    pub fn sdk_phase(&self) -> SdkPhase {
        self.lock().sdk_phase
    }

    pub(crate) fn set_sdk_phase(&self, phase: SdkPhase) {
        self.lock().sdk_phase = phase;
    }

    #[must_use]
    pub fn session(&self) -> Session {
        let state = self.lock();
        Session {
            connected: state.connected_reader.is_some(),
            active_reader: state.connected_reader.clone(),
        }
    }

    #[must_use]
    pub fn connected_reader(&self) -> Option<Reader> {
        self.lock().connected_reader.clone()
    }

    /// Mark `reader` connected and open the pay control.
    pub(crate) fn set_connected(&self, reader: Reader) {
        let mut state = self.lock();
        state.connected_reader = Some(reader);
        state.pay_enabled = !state.payment_in_flight;
    }

    /// Clear the connected reader and close the pay control.
    pub(crate) fn clear_connected(&self) -> Option<Reader> {
        let mut state = self.lock();
        state.pay_enabled = false;
        state.connected_reader.take()
    }

    #[must_use]
    pub fn discovered_readers(&self) -> Vec<Reader> {
        self.lock().discovered.clone()
    }

    /// Look a reader up in the current discovery set only.
    #[must_use]
    pub fn find_discovered(&self, id: &ReaderId) -> Option<Reader> {
        self.lock().discovered.iter().find(|r| &r.id == id).cloned()
    }

    /// Replace the discovered set wholesale.
    pub(crate) fn replace_discovered(&self, readers: Vec<Reader>) {
        self.lock().discovered = readers;
    }

    /// Forget the connected reader and the discovered set; close the pay
    /// control.
    pub(crate) fn restore_default(&self) {
        let mut state = self.lock();
        state.connected_reader = None;
        state.discovered.clear();
        state.pay_enabled = false;
    }

    // ── Pay control ────────────────────────────────────────────────

    #[must_use]
    pub fn pay_enabled(&self) -> bool {
        self.lock().pay_enabled
    }

    /// Close the pay control for the duration of a flow. Fails if the
    /// control is already closed (no reader, or another flow running).
    pub(crate) fn begin_payment(&self) -> bool {
        let mut state = self.lock();
        if !state.pay_enabled || state.payment_in_flight {
            return false;
        }
        state.pay_enabled = false;
        state.payment_in_flight = true;
        state.payment_phase = PaymentPhase::Idle;
        true
    }

    /// End the running flow. The pay control reopens only when asked to and
    /// a reader is still connected.
    pub(crate) fn finish_payment(&self, reenable: bool) {
        let mut state = self.lock();
        state.payment_in_flight = false;
        state.pay_enabled = reenable && state.connected_reader.is_some();
    }

    /// Close the pay control immediately, whatever the flow is doing.
    pub(crate) fn disable_pay(&self) {
        self.lock().pay_enabled = false;
    }

    #[must_use]
    pub fn payment_in_flight(&self) -> bool {
        self.lock().payment_in_flight
    }

    #[must_use]
    pub fn payment_phase(&self) -> PaymentPhase {
        self.lock().payment_phase
    }

    pub(crate) fn set_payment_phase(&self, phase: PaymentPhase) {
        self.lock().payment_phase = phase;
    }

    // ── Status line and notices ────────────────────────────────────

    #[must_use]
    pub fn status(&self) -> Option<String> {
        self.lock().status.clone()
    }

    pub(crate) fn set_status(&self, status: impl Into<String>) {
        self.lock().status = Some(status.into());
    }

    pub(crate) fn push_notice(&self, notice: impl Into<String>) {
        self.lock().notices.push(notice.into());
    }

    /// Drain operator notices (alerts) raised since the last call.
    pub fn take_notices(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().notices)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

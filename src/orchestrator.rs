//! Payment orchestration state machine.
//!
//! ```text
//! Idle ─▶ IntentCreated ─▶ Collecting ─▶ Collected ─▶ Processing ─┬─▶ Succeeded
//!                              ▲                          ▲        ├─▶ RequiresRetryMethod ─▶ Collecting (once)
//!                              │                          └────────┼── RequiresConfirmation (once)
//!                              │                                   ├─▶ Failed
//!                              └── any device failure ─────────────┴─▶ Canceled
//! ```
//!
//! Each transition is one call to [`PaymentOrchestrator::advance`]; retry
//! bounds live in the [`RetryBudget`] carried by the state, so the machine
//! cannot loop no matter how often the reader reports a decline.

use std::sync::Arc;

use crate::backend::PaymentBackend;
use crate::context::{PaymentPhase, TerminalContext};
use crate::error::{Error, NETWORK_UNREACHABLE};
use crate::events::{EventBus, SubscriptionId, Topic};
use crate::intent::IntentLifecycleClient;
use crate::session::ReaderSessionManager;
use crate::terminal::{SdkError, SdkErrorKind, TerminalConnector, TerminalSdk};
use crate::types::{Amount, IntentStatus, PaymentIntent};

pub const STATUS_PENDING: &str = "Payment pending...";
pub const STATUS_SUCCESS: &str = "Payment success";
pub const STATUS_RETRY_METHOD: &str = "Try using another payment method";
pub const MSG_INVALID_AMOUNT: &str = "Make sure to enter a numeric amount";
pub const MSG_UNAVAILABLE: &str = "Connect a reader before taking a payment";

/// Stage of the flow a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStage {
    CreateIntent,
    CollectPaymentMethod,
    ProcessPayment,
}

impl PaymentStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateIntent => "Create payment intent",
            Self::CollectPaymentMethod => "Collect payment method",
            Self::ProcessPayment => "Process payment",
        }
    }
}

impl std::fmt::Display for PaymentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure class, decided where the error is first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The reader stopped responding; the session must be rebuilt.
    Device,
    /// The payment method was refused.
    Declined,
    /// Backend or SDK unreachable.
    Network,
    /// The backend rejected the request.
    Backend,
    Other,
}

/// Stage-tagged failure of a payment flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage}: {message}")]
pub struct PaymentFailure {
    pub stage: PaymentStage,
    pub kind: FailureKind,
    pub message: String,
    pub code: Option<String>,
}

impl PaymentFailure {
    fn from_sdk(stage: PaymentStage, error: &SdkError) -> Self {
        let kind = match error.kind {
            SdkErrorKind::ReaderCommunication => FailureKind::Device,
            SdkErrorKind::Declined => FailureKind::Declined,
            SdkErrorKind::Network => FailureKind::Network,
            _ => FailureKind::Other,
        };
        let message = match kind {
            FailureKind::Network => NETWORK_UNREACHABLE.to_owned(),
            _ => error.message.clone(),
        };
        Self {
            stage,
            kind,
            message,
            code: error.code.clone(),
        }
    }

    fn from_error(stage: PaymentStage, error: &Error) -> Self {
        let kind = match error {
            Error::Backend { .. } => FailureKind::Backend,
            e if e.is_network() => FailureKind::Network,
            _ => FailureKind::Other,
        };
        let code = match error {
            Error::Backend { error, .. } => error.code.clone(),
            _ => None,
        };
        Self {
            stage,
            kind,
            message: error.user_message(),
            code,
        }
    }

    #[must_use]
    pub fn is_device(&self) -> bool {
        self.kind == FailureKind::Device
    }

    /// Text for the status line.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("Payment failed: {}", self.message)
    }
}

/// Remaining automatic retries for one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub method_retries: u8,
    pub confirmation_retries: u8,
}

impl RetryBudget {
    pub const MAX_METHOD_RETRIES: u8 = 1;
    pub const MAX_CONFIRMATION_RETRIES: u8 = 1;

    #[must_use]
    pub fn new() -> Self {
        Self {
            method_retries: Self::MAX_METHOD_RETRIES,
            confirmation_retries: Self::MAX_CONFIRMATION_RETRIES,
        }
    }

    fn spend_method_retry(self) -> Option<Self> {
        let method_retries = self.method_retries.checked_sub(1)?;
        Some(Self {
            method_retries,
            ..self
        })
    }

    fn spend_confirmation_retry(self) -> Option<Self> {
        let confirmation_retries = self.confirmation_retries.checked_sub(1)?;
        Some(Self {
            confirmation_retries,
            ..self
        })
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator state with its transition data.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentState {
    Idle {
        amount: Amount,
    },
    IntentCreated {
        intent: PaymentIntent,
    },
    Collecting {
        intent: PaymentIntent,
        budget: RetryBudget,
    },
    Collected {
        intent: PaymentIntent,
        budget: RetryBudget,
    },
    Processing {
        intent: PaymentIntent,
        budget: RetryBudget,
    },
    RequiresRetryMethod {
        intent: PaymentIntent,
        budget: RetryBudget,
        failure: PaymentFailure,
    },
    RequiresConfirmation {
        intent: PaymentIntent,
        budget: RetryBudget,
        failure: PaymentFailure,
    },
    Succeeded {
        intent: PaymentIntent,
    },
    Failed {
        intent: Option<PaymentIntent>,
        failure: PaymentFailure,
    },
    Canceled {
        intent: PaymentIntent,
        failure: PaymentFailure,
    },
}

impl PaymentState {
    #[must_use]
    pub fn phase(&self) -> PaymentPhase {
        match self {
            Self::Idle { .. } => PaymentPhase::Idle,
            Self::IntentCreated { .. } => PaymentPhase::IntentCreated,
            Self::Collecting { .. } => PaymentPhase::Collecting,
            Self::Collected { .. } => PaymentPhase::Collected,
            Self::Processing { .. } => PaymentPhase::Processing,
            Self::RequiresRetryMethod { .. } => PaymentPhase::RequiresRetryMethod,
            Self::RequiresConfirmation { .. } => PaymentPhase::RequiresConfirmation,
            Self::Succeeded { .. } => PaymentPhase::Succeeded,
            Self::Failed { .. } => PaymentPhase::Failed,
            Self::Canceled { .. } => PaymentPhase::Canceled,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Canceled { .. }
        )
    }
}

/// Why a pay request never started a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidAmount,
    /// No reader connected, or another flow is running.
    Unavailable,
}

/// Result of one [`PaymentOrchestrator::pay`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Rejected(Rejection),
    Succeeded(PaymentIntent),
    Failed {
        intent: Option<PaymentIntent>,
        failure: PaymentFailure,
    },
    /// Device failure: the intent was canceled and the session reset.
    Canceled {
        intent: PaymentIntent,
        failure: PaymentFailure,
    },
}

impl PaymentOutcome {
    /// Text for the status line.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Rejected(Rejection::InvalidAmount) => MSG_INVALID_AMOUNT.to_owned(),
            Self::Rejected(Rejection::Unavailable) => MSG_UNAVAILABLE.to_owned(),
            Self::Succeeded(_) => STATUS_SUCCESS.to_owned(),
            Self::Failed { failure, .. } | Self::Canceled { failure, .. } => {
                failure.user_message()
            }
        }
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Drives a single payment from amount entry to a terminal outcome.
///
/// Subscribes to [`Topic::ConnectionLost`] for its lifetime: a reader that
/// drops mid-flow closes the pay control at once, without waiting for the
/// flow to finish.
pub struct PaymentOrchestrator<C: TerminalConnector, B> {
    session: Arc<ReaderSessionManager<C>>,
    intents: IntentLifecycleClient<B>,
    context: Arc<TerminalContext>,
    bus: EventBus,
    subscription: SubscriptionId,
}

impl<C: TerminalConnector, B: PaymentBackend> PaymentOrchestrator<C, B> {
    #[must_use]
    pub fn new(
        session: Arc<ReaderSessionManager<C>>,
        intents: IntentLifecycleClient<B>,
        context: Arc<TerminalContext>,
        bus: EventBus,
    ) -> Self {
        let subscription = {
            let context = Arc::clone(&context);
            bus.subscribe(Topic::ConnectionLost, move |_| {
                if context.payment_in_flight() {
                    tracing::warn!("Reader lost during payment; payment entry disabled");
                }
                context.disable_pay();
            })
        };
        Self {
            session,
            intents,
            context,
            bus,
            subscription,
        }
    }

    /// Take a payment of `amount` (operator input, validated locally).
    pub async fn pay(&self, amount: &str) -> PaymentOutcome {
        let Ok(amount) = amount.parse::<Amount>() else {
            tracing::debug!(input = %amount, "Rejected non-numeric amount");
            self.context.set_status(MSG_INVALID_AMOUNT);
            return PaymentOutcome::Rejected(Rejection::InvalidAmount);
        };

        let sdk = match self.session.sdk().await {
            Some(sdk) if self.context.begin_payment() => sdk,
            _ => {
                self.context.set_status(MSG_UNAVAILABLE);
                return PaymentOutcome::Rejected(Rejection::Unavailable);
            }
        };
        self.context.set_status(STATUS_PENDING);

        let mut state = PaymentState::Idle { amount };
        loop {
            self.context.set_payment_phase(state.phase());
            if state.is_terminal() {
                break;
            }
            state = self.advance(sdk.as_ref(), state).await;
        }

        self.finish(state)
    }

    /// Perform one transition.
    pub async fn advance(&self, sdk: &C::Sdk, state: PaymentState) -> PaymentState {
        tracing::debug!(phase = ?state.phase(), "Payment transition");
        match state {
            PaymentState::Idle { amount } => self.create_intent(&amount).await,

            PaymentState::IntentCreated { intent } => PaymentState::Collecting {
                intent,
                budget: RetryBudget::new(),
            },

            PaymentState::Collecting { intent, budget } => {
                match sdk.collect_payment_method(&intent.client_secret).await {
                    Ok(collected) => PaymentState::Collected {
                        intent: collected,
                        budget,
                    },
                    Err(e) => {
                        let failure = PaymentFailure::from_sdk(PaymentStage::CollectPaymentMethod, &e);
                        tracing::warn!(intent_id = %intent.id, error = %e, "Collect payment method failed");
                        self.fail(intent, failure).await
                    }
                }
            }

            PaymentState::Collected { intent, budget } => {
                PaymentState::Processing { intent, budget }
            }

            PaymentState::Processing { intent, budget } => {
                match sdk.process_payment(&intent).await {
                    Ok(processed) => PaymentState::Succeeded { intent: processed },
                    Err(e) => {
                        let failure = PaymentFailure::from_sdk(PaymentStage::ProcessPayment, &e.error);
                        tracing::warn!(intent_id = %intent.id, error = %e, "Process payment failed");
                        let status = e.payment_intent.as_ref().map(|i| i.status);
                        match (e.payment_intent, status) {
                            _ if failure.is_device() => self.fail(intent, failure).await,
                            (Some(snapshot), Some(IntentStatus::RequiresPaymentMethod)) => {
                                PaymentState::RequiresRetryMethod {
                                    intent: snapshot,
                                    budget,
                                    failure,
                                }
                            }
                            (Some(snapshot), Some(IntentStatus::RequiresConfirmation)) => {
                                PaymentState::RequiresConfirmation {
                                    intent: snapshot,
                                    budget,
                                    failure,
                                }
                            }
                            (snapshot, _) => self.fail(snapshot.unwrap_or(intent), failure).await,
                        }
                    }
                }
            }

            PaymentState::RequiresRetryMethod {
                intent,
                budget,
                failure,
            } => match budget.spend_method_retry() {
                Some(budget) => {
                    tracing::info!(intent_id = %intent.id, "Payment method declined; collecting another");
                    self.context.set_status(STATUS_RETRY_METHOD);
                    PaymentState::Collecting { intent, budget }
                }
                None => self.fail(intent, failure).await,
            },

            PaymentState::RequiresConfirmation {
                intent,
                budget,
                failure,
            } => match budget.spend_confirmation_retry() {
                Some(budget) => {
                    tracing::info!(intent_id = %intent.id, "Confirming payment again");
                    PaymentState::Processing { intent, budget }
                }
                None => self.fail(intent, failure).await,
            },

            terminal @ (PaymentState::Succeeded { .. }
            | PaymentState::Failed { .. }
            | PaymentState::Canceled { .. }) => terminal,
        }
    }

    async fn create_intent(&self, amount: &Amount) -> PaymentState {
        match self.intents.create_intent(amount).await {
            Ok(intent) => PaymentState::IntentCreated { intent },
            Err(e) => {
                tracing::warn!(error = %e, "Payment intent creation failed");
                if let Error::Backend { error, .. } = &e {
                    if let Some(id) = error.payment_intent_id() {
                        let _ = self.intents.cancel_intent(id).await;
                    }
                }
                PaymentState::Failed {
                    intent: None,
                    failure: PaymentFailure::from_error(PaymentStage::CreateIntent, &e),
                }
            }
        }
    }

    /// Route a failure: device failures cancel the intent and reset the
    /// session; everything else leaves the intent for the backend to track.
    async fn fail(&self, intent: PaymentIntent, failure: PaymentFailure) -> PaymentState {
        if !failure.is_device() {
            return PaymentState::Failed {
                intent: Some(intent),
                failure,
            };
        }

        if intent.is_succeeded() {
            tracing::warn!(intent_id = %intent.id, "Not canceling a succeeded intent");
        } else {
            let _ = self.intents.cancel_intent(&intent.id).await;
        }
        self.session.reset();
        PaymentState::Canceled { intent, failure }
    }

    fn finish(&self, state: PaymentState) -> PaymentOutcome {
        let outcome = match state {
            PaymentState::Succeeded { intent } => {
                tracing::info!(intent_id = %intent.id, "Payment succeeded");
                PaymentOutcome::Succeeded(intent)
            }
            PaymentState::Canceled { intent, failure } => {
                tracing::warn!(intent_id = %intent.id, failure = %failure, "Payment canceled");
                PaymentOutcome::Canceled { intent, failure }
            }
            PaymentState::Failed { intent, failure } => {
                tracing::warn!(failure = %failure, "Payment failed");
                PaymentOutcome::Failed { intent, failure }
            }
            other => {
                tracing::error!(phase = ?other.phase(), "Payment flow stopped in a non-terminal state");
                PaymentOutcome::Failed {
                    intent: None,
                    failure: PaymentFailure {
                        stage: PaymentStage::ProcessPayment,
                        kind: FailureKind::Other,
                        message: "payment flow interrupted".into(),
                        code: None,
                    },
                }
            }
        };

        let reenable = !matches!(outcome, PaymentOutcome::Canceled { .. });
        self.context.finish_payment(reenable);
        self.context.set_status(outcome.message());
        outcome
    }
}

impl<C: TerminalConnector, B> Drop for PaymentOrchestrator<C, B> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}

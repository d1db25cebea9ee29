use std::sync::Arc;

use crate::backend::PaymentBackend;
use crate::error::Error;
use crate::types::{Amount, PaymentIntent, PaymentIntentId};

/// Creates and cancels payment intents.
pub struct IntentLifecycleClient<B> {
    backend: Arc<B>,
}

impl<B> Clone for IntentLifecycleClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: PaymentBackend> IntentLifecycleClient<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Create a card-present intent for `amount`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] if the backend answers with an error body,
    /// or a transport error if it cannot be reached. Nothing needs cleaning
    /// up unless the backend error names an intent.
    pub async fn create_intent(&self, amount: &Amount) -> Result<PaymentIntent, Error> {
        let intent = self.backend.create_payment_intent(amount).await?;
        tracing::info!(intent_id = %intent.id, amount = %amount, "Payment intent created");
        Ok(intent)
    }

    /// Best-effort cancellation. The outcome is logged and handed back as
    /// data; callers on a cleanup path inspect or drop it, never `?` it.
    pub async fn cancel_intent(&self, id: &PaymentIntentId) -> Result<PaymentIntent, Error> {
        let result = self.backend.cancel_payment_intent(id).await;
        match &result {
            Ok(intent) => tracing::info!(intent_id = %id, status = ?intent.status, "Payment intent canceled"),
            Err(e) => tracing::warn!(intent_id = %id, error = %e, "Payment intent cancellation failed"),
        }
        result
    }
}

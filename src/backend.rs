use std::future::Future;

use crate::error::Error;
use crate::types::{Amount, ConnectionToken, PaymentIntent, PaymentIntentId};

/// Payment backend operations used by the point of sale.
///
/// [`BackendClient`] implements this over HTTP. Implement it yourself to
/// route through your own server or to substitute a test double.
pub trait PaymentBackend: Send + Sync + 'static {
    /// `POST terminal/connection_tokens`
    fn create_connection_token(
        &self,
    ) -> impl Future<Output = Result<ConnectionToken, Error>> + Send;

    /// `POST payment_intents` for a card-present payment of `amount`.
    fn create_payment_intent(
        &self,
        amount: &Amount,
    ) -> impl Future<Output = Result<PaymentIntent, Error>> + Send;

    /// `POST payment_intents/{id}/cancel`
    fn cancel_payment_intent(
        &self,
        id: &PaymentIntentId,
    ) -> impl Future<Output = Result<PaymentIntent, Error>> + Send;
}

#[cfg(feature = "http")]
pub use http::BackendClient;

#[cfg(feature = "http")]
mod http {
    use serde::Deserialize;
    use serde::de::DeserializeOwned;

    use super::PaymentBackend;
    use crate::config::BackendConfig;
    use crate::error::Error;
    use crate::types::{Amount, BackendError, ConnectionToken, PaymentIntent, PaymentIntentId};

    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: BackendError,
    }

    /// HTTP client for the payment backend.
    #[derive(Debug, Clone)]
    pub struct BackendClient {
        config: BackendConfig,
        http: reqwest::Client,
    }

    impl BackendClient {
        #[must_use]
        pub fn new(config: BackendConfig) -> Self {
            Self {
                config,
                http: reqwest::Client::new(),
            }
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        #[must_use]
        pub fn config(&self) -> &BackendConfig {
            &self.config
        }

        async fn post<T: DeserializeOwned>(
            &self,
            path: &str,
            form: &[(&str, &str)],
            operation: &'static str,
        ) -> Result<T, Error> {
            let url = self.config.endpoint(path)?;
            let response = self
                .http
                .post(url)
                .bearer_auth(&self.config.secret_key)
                .header(reqwest::header::ACCEPT, "application/json")
                .form(form)
                .send()
                .await?;

            let response = Self::ensure_success(response, operation).await?;
            response.json::<T>().await.map_err(Into::into)
        }

        /// Checks HTTP response status; returns the response on success or the
        /// backend's error object.
        async fn ensure_success(
            response: reqwest::Response,
            operation: &'static str,
        ) -> Result<reqwest::Response, Error> {
            if response.status().is_success() {
                return Ok(response);
            }
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error)
                .unwrap_or_else(|_| BackendError::new(format!("HTTP {status}: {body}")));
            tracing::warn!(operation, status = status.as_u16(), error = %error, "Backend request failed");
            Err(Error::Backend { operation, error })
        }
    }

    impl PaymentBackend for BackendClient {
        async fn create_connection_token(&self) -> Result<ConnectionToken, Error> {
            self.post("terminal/connection_tokens", &[], "create connection token")
                .await
        }

        async fn create_payment_intent(&self, amount: &Amount) -> Result<PaymentIntent, Error> {
            let form = [
                ("amount", amount.as_str()),
                ("currency", self.config.currency.as_str()),
                ("payment_method_types[]", "card_present"),
            ];
            self.post("payment_intents", &form, "create payment intent")
                .await
        }

        async fn cancel_payment_intent(&self, id: &PaymentIntentId) -> Result<PaymentIntent, Error> {
            let path = format!("payment_intents/{id}/cancel");
            self.post(&path, &[], "cancel payment intent").await
        }
    }
}

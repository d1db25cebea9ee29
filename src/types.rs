use std::str::FromStr;

use derive_more::{Display, From, Into};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Reader identifier, unique within one discovery batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct ReaderId(pub String);

impl From<&str> for ReaderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Backend payment intent identifier (`pi_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct PaymentIntentId(pub String);

impl From<&str> for PaymentIntentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Client secret of a payment intent, handed to the reader for collection.
///
/// `Debug` is redacted; use [`expose`](ClientSecret::expose) to read it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret(***)")
    }
}

/// Validated payment amount: a positive decimal number.
///
/// Guaranteed valid by construction. The trimmed text the operator entered
/// is kept as-is and sent to the backend verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount {
    text: String,
    value: Decimal,
}

impl Amount {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn value(&self) -> Decimal {
        self.value
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let numeric = text
            .char_indices()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-')));
        if !numeric {
            return Err(Error::InvalidAmount(s.to_owned()));
        }
        match Decimal::from_str(text) {
            Ok(value) if value > Decimal::ZERO => Ok(Self {
                text: text.to_owned(),
                value,
            }),
            _ => Err(Error::InvalidAmount(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Amount {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A discoverable or connected card reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Reader {
    pub id: ReaderId,
    pub label: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

impl Reader {
    #[must_use]
    pub fn new(id: impl Into<ReaderId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            device_type: None,
            serial_number: None,
        }
    }

    #[must_use]
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    #[must_use]
    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }
}

/// Snapshot of the single reader session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub connected: bool,
    pub active_reader: Option<Reader>,
}

/// Lifecycle status of a payment intent as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum IntentStatus {
    Created,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Local snapshot of a backend payment intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub client_secret: ClientSecret,
    pub status: IntentStatus,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, with = "time::serde::timestamp::option")]
    pub created: Option<time::OffsetDateTime>,
    #[serde(default)]
    pub last_payment_error: Option<BackendError>,
}

impl PaymentIntent {
    #[must_use]
    pub fn new(
        id: impl Into<PaymentIntentId>,
        client_secret: impl Into<String>,
        status: IntentStatus,
        amount: i64,
    ) -> Self {
        Self {
            id: id.into(),
            client_secret: ClientSecret(client_secret.into()),
            status,
            amount,
            currency: None,
            created: None,
            last_payment_error: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: IntentStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status == IntentStatus::Succeeded
    }
}

/// Reference to an intent inside a backend error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRef {
    pub id: PaymentIntentId,
}

/// Error object returned by the backend (`{"error": {...}}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct BackendError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<IntentRef>,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind: None,
            payment_intent: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_payment_intent(mut self, id: impl Into<PaymentIntentId>) -> Self {
        self.payment_intent = Some(IntentRef { id: id.into() });
        self
    }

    /// Intent the failed request created or touched, if the backend named one.
    #[must_use]
    pub fn payment_intent_id(&self) -> Option<&PaymentIntentId> {
        self.payment_intent.as_ref().map(|r| &r.id)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Short-lived credential consumed by the terminal SDK. Never cached.
#[derive(Clone, Deserialize)]
pub struct ConnectionToken {
    pub secret: String,
}

impl std::fmt::Debug for ConnectionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConnectionToken(***)")
    }
}

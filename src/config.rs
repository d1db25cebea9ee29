use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

const DEFAULT_API_URL: &str = "https://api.stripe.com/v1/";
const DEFAULT_SDK_URL: &str = "https://js.stripe.com/terminal/v1/";
const DEFAULT_CURRENCY: &str = "usd";

/// Payment backend configuration.
///
/// The secret key is the only required field; everything else has a default.
///
/// ```rust,ignore
/// use terminal_pos::BackendConfig;
///
/// let config = BackendConfig::new("sk_test_...")
///     .with_api_url("https://backend.example.com/v1/".parse()?);
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct BackendConfig {
    pub(crate) api_url: Url,
    pub(crate) secret_key: String,
    pub(crate) currency: String,
}

impl BackendConfig {
    #[must_use]
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.parse().expect("valid default URL"),
            secret_key: secret_key.into(),
            currency: DEFAULT_CURRENCY.into(),
        }
    }

    /// Override the backend base URL. A trailing `/` is added if missing so
    /// endpoint paths join under it.
    #[must_use]
    pub fn with_api_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.api_url = url;
        self
    }

    /// Override the currency sent with new intents (default: `usd`).
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Backend base URL, always ending in `/`.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Bearer secret sent with every backend request.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Currency for new payment intents.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Resolve an endpoint path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.api_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint {path}: {e}")))
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url.as_str())
            .field("secret_key", &"***")
            .field("currency", &self.currency)
            .finish()
    }
}

/// Options passed to the SDK's reader discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiscoveryConfig {
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl DiscoveryConfig {
    #[must_use]
    pub fn simulated() -> Self {
        Self {
            simulated: true,
            location: None,
        }
    }

    #[must_use]
    pub fn physical() -> Self {
        Self {
            simulated: false,
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::simulated()
    }
}

/// Point-of-sale configuration.
///
/// Use [`from_env()`](PosConfig::from_env) for convention-based setup,
/// or [`new()`](PosConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct PosConfig {
    pub(crate) backend: BackendConfig,
    pub(crate) discovery: DiscoveryConfig,
    pub(crate) sdk_script_url: Url,
}

impl PosConfig {
    #[must_use]
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            discovery: DiscoveryConfig::default(),
            sdk_script_url: DEFAULT_SDK_URL.parse().expect("valid default URL"),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `POS_SECRET_KEY`: backend bearer secret
    ///
    /// # Optional env vars
    /// - `POS_API_URL`: backend base URL
    /// - `POS_CURRENCY`: currency for new intents
    /// - `POS_SDK_URL`: terminal SDK script URL, passed through to connectors
    /// - `POS_SIMULATED_READERS`: `"1"`/`"true"` (default) or `"0"`/`"false"`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the secret is missing or a URL is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let secret_key = var("POS_SECRET_KEY")
            .ok_or_else(|| Error::Config("POS_SECRET_KEY is required".into()))?;

        let mut backend = BackendConfig::new(secret_key);
        if let Some(url_str) = var("POS_API_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| Error::Config(format!("POS_API_URL: {e}")))?;
            backend = backend.with_api_url(url);
        }
        if let Some(currency) = var("POS_CURRENCY") {
            backend = backend.with_currency(currency.trim().to_lowercase());
        }

        let mut config = Self::new(backend);
        if let Some(url_str) = var("POS_SDK_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| Error::Config(format!("POS_SDK_URL: {e}")))?;
            config = config.with_sdk_script_url(url);
        }

        let simulated = !matches!(
            var("POS_SIMULATED_READERS").as_deref(),
            Some("0") | Some("false"),
        );
        let discovery = if simulated {
            DiscoveryConfig::simulated()
        } else {
            DiscoveryConfig::physical()
        };

        Ok(config.with_discovery(discovery))
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    #[must_use]
    pub fn with_sdk_script_url(mut self, url: Url) -> Self {
        self.sdk_script_url = url;
        self
    }

    /// Backend connection settings.
    #[must_use]
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Options passed to reader discovery.
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    /// Script URL for SDK loaders; the crate itself never fetches it.
    #[must_use]
    pub fn sdk_script_url(&self) -> &Url {
        &self.sdk_script_url
    }
}

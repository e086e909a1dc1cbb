//! Connection and server configuration.
//!
//! Configuration is read-only input to the manager: a [`ServiceLayerConfig`]
//! describing how to reach the Service Layer, and an optional
//! [`OperatorVerifier`] used by the step-up credential-reveal gate.
//!
//! Settings are deserialized and validated once at the boundary; everything
//! past that point operates on typed values. The Service Layer password is
//! wrapped in [`Secret`] so it cannot leak through `Debug`, `Display`, or
//! serialization. At-rest encryption of the persisted password is the job of
//! the deployment's settings store; this process receives it through the
//! environment or the config file and keeps it opaque in memory.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

use crate::{Result, SlError};

/// Default session time-to-live: 30 minutes, matching the Service Layer's
/// own default session timeout.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Default per-request timeout for Service Layer calls. The Service Layer
/// sometimes hangs, so every call carries a bound.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A secret string that redacts itself everywhere except through an
/// explicit [`expose`](Secret::expose) call.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plaintext. Call sites are the audit surface for where
    /// the secret actually travels.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(\"{}\")", crate::session::mask_token(&self.0))
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::session::mask_token(&self.0))
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Connection settings for one Service Layer instance.
///
/// Immutable once constructed; the manager never mutates it. Use the
/// builder methods for the optional knobs:
///
/// ```
/// use slbridge::config::ServiceLayerConfig;
/// use std::time::Duration;
///
/// let config = ServiceLayerConfig::new(
///     "https://b1.example.com:50000/b1s/v1",
///     "SBODEMOUS",
///     "manager",
///     "secret-password",
/// )
/// .with_session_ttl(Duration::from_secs(900));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServiceLayerConfig {
    /// Service Layer base URL, e.g. `https://host:50000/b1s/v1`.
    pub base_url: String,

    /// Company database identifier.
    pub company_db: String,

    /// Service Layer username.
    pub username: String,

    /// Service Layer password. Never revealed by any operation.
    pub password: Secret,

    /// TTL applied when the login reply does not carry its own timeout.
    pub session_ttl: Duration,

    /// Bound on every outbound Service Layer call.
    pub request_timeout: Duration,
}

impl ServiceLayerConfig {
    pub fn new(
        base_url: impl Into<String>,
        company_db: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            company_db: company_db.into(),
            username: username.into(),
            password: Secret::new(password),
            session_ttl: DEFAULT_SESSION_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the fallback session time-to-live.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Sets the per-request network timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validates the settings before any network call is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`SlError::Configuration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(SlError::Configuration("base_url is required".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(SlError::Configuration(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.company_db.trim().is_empty() {
            return Err(SlError::Configuration("company_db is required".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(SlError::Configuration("username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(SlError::Configuration("password is required".to_string()));
        }
        if self.session_ttl.is_zero() {
            return Err(SlError::Configuration(
                "session_ttl must be positive".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SlError::Configuration(
                "request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Verifier for the local operator's password, used by the step-up
/// credential-reveal gate.
///
/// Stores only a salted SHA-256 digest (base64); the operator password
/// itself is never kept. This gate authenticates the *calling user*, not
/// the Service Layer, and is independent of the session lifecycle.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorVerifier {
    salt: String,
    digest: String,
}

impl OperatorVerifier {
    /// Builds a verifier from a stored salt and base64 digest.
    pub fn new(salt: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            digest: digest.into(),
        }
    }

    /// Derives a verifier from a plaintext password. Used when seeding
    /// configuration and in tests.
    pub fn from_password(salt: impl Into<String>, password: &str) -> Self {
        let salt = salt.into();
        let digest = Self::digest_of(&salt, password);
        Self { salt, digest }
    }

    /// Checks a supplied password against the stored digest.
    pub fn verify(&self, password: &str) -> bool {
        Self::digest_of(&self.salt, password) == self.digest
    }

    fn digest_of(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        BASE64.encode(hasher.finalize())
    }
}

/// HTTP listener settings for the API surface.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8974,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
struct ServiceLayerSettings {
    base_url: String,
    company_db: String,
    username: String,
    #[serde(default)]
    password: Option<Secret>,
    #[serde(default)]
    session_ttl_secs: Option<u64>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

/// Top-level application configuration for the `slbridge` binary.
///
/// Loaded from a TOML file with environment overrides under the `SLBRIDGE`
/// prefix (e.g. `SLBRIDGE__SERVICE_LAYER__PASSWORD`), so the password can be
/// supplied through the environment and never written to disk in plaintext.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    service_layer: ServiceLayerSettings,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub operator: Option<OperatorVerifier>,
}

impl AppConfig {
    /// Loads and validates configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SlError::Configuration`] if the file cannot be parsed or a
    /// required field is missing after merging environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SLBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SlError::Configuration(e.to_string()))?;

        let cfg: AppConfig = raw
            .try_deserialize()
            .map_err(|e| SlError::Configuration(e.to_string()))?;

        cfg.service_layer_config()?.validate()?;
        Ok(cfg)
    }

    /// Produces the validated Service Layer connection settings.
    pub fn service_layer_config(&self) -> Result<ServiceLayerConfig> {
        let s = &self.service_layer;
        let password = s
            .password
            .clone()
            .ok_or_else(|| SlError::Configuration("service_layer.password is required".to_string()))?;

        let mut cfg = ServiceLayerConfig::new(
            s.base_url.clone(),
            s.company_db.clone(),
            s.username.clone(),
            password.expose(),
        );
        if let Some(secs) = s.session_ttl_secs {
            cfg = cfg.with_session_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = s.request_timeout_secs {
            cfg = cfg.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(cfg)
    }
}

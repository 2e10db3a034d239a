//! Credential management for Phemex API authentication.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::error::StreamerError;

/// Default environment variable holding the API key.
pub const API_KEY_VAR: &str = "PHEMEX_API_KEY";
/// Default environment variable holding the API secret.
pub const API_SECRET_VAR: &str = "PHEMEX_API_SECRET";

/// API credentials containing the key and secret.
///
/// Credentials are immutable once built. The secret is only ever used to
/// derive signatures and is never sent over the wire.
#[derive(Clone)]
pub struct Credentials {
    /// The API key (public identifier)
    pub api_key: String,
    /// The API secret (private, used for signing)
    api_secret: SecretString,
}

impl Credentials {
    /// Create new credentials from an API key and secret.
    ///
    /// Fails with [`StreamerError::InvalidCredentials`] if either part is empty.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, StreamerError> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.trim().is_empty() {
            return Err(StreamerError::InvalidCredentials(
                "API key must not be empty".into(),
            ));
        }
        if api_secret.is_empty() {
            return Err(StreamerError::InvalidCredentials(
                "API secret must not be empty".into(),
            ));
        }

        Ok(Self {
            api_key,
            api_secret: SecretString::from(api_secret),
        })
    }

    /// Get the API secret for signing.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Trait for providing API credentials.
///
/// Implement this trait to customize how credentials are retrieved,
/// for example from a secrets manager or environment variables.
pub trait CredentialsProvider: Send + Sync {
    /// Get the credentials.
    fn get_credentials(&self) -> &Credentials;
}

impl CredentialsProvider for Credentials {
    fn get_credentials(&self) -> &Credentials {
        self
    }
}

/// Static credentials provider that holds credentials directly.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Create a new static credentials provider.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, StreamerError> {
        Ok(Self {
            credentials: Credentials::new(api_key, api_secret)?,
        })
    }
}

impl CredentialsProvider for StaticCredentials {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl CredentialsProvider for Arc<StaticCredentials> {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Credentials provider that reads from environment variables.
///
/// By default, reads from `PHEMEX_API_KEY` and `PHEMEX_API_SECRET`.
#[derive(Debug)]
pub struct EnvCredentials {
    credentials: Credentials,
}

impl EnvCredentials {
    /// Create credentials from default environment variables.
    pub fn from_env() -> Result<Self, StreamerError> {
        Self::from_env_vars(API_KEY_VAR, API_SECRET_VAR)
    }

    /// Create credentials from custom environment variable names.
    ///
    /// Returns [`StreamerError::MissingCredentials`] if a variable is unset.
    pub fn from_env_vars(key_var: &str, secret_var: &str) -> Result<Self, StreamerError> {
        let api_key = std::env::var(key_var).map_err(|_| StreamerError::MissingCredentials)?;
        let api_secret =
            std::env::var(secret_var).map_err(|_| StreamerError::MissingCredentials)?;

        Ok(Self {
            credentials: Credentials::new(api_key, api_secret)?,
        })
    }

    /// Try to create credentials from default environment variables.
    ///
    /// Returns `None` if the variables are not set or are empty.
    pub fn try_from_env() -> Option<Self> {
        Self::from_env().ok()
    }
}

impl CredentialsProvider for EnvCredentials {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

//! Credentials and request signing.
//!
//! The channel asks a [`CredentialProvider`] for credentials on every request
//! and hands them to a [`RequestSigner`], which returns the headers to attach.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

use crate::channel::Operation;
use crate::error::CredentialsError;

/// Access credentials for the control plane.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// When temporary credentials stop being valid.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create long-lived credentials.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expires_at: None,
        }
    }

    /// Returns true if the credentials carry an expiry in the past.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies credentials for signing control plane requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return currently valid credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable credentials are available.
    async fn credentials(&self) -> Result<Credentials, CredentialsError>;
}

/// A provider returning one fixed set of credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    /// Create a provider for the given credentials.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        if self.credentials.is_expired() {
            return Err(CredentialsError::Expired);
        }
        Ok(self.credentials.clone())
    }
}

/// Reads credentials from the standard environment variables.
///
/// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` are required;
/// `AWS_SESSION_TOKEN` is optional. Variables are read on every call so
/// rotated values are picked up.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new environment credential provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, CredentialsError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let access_key_id =
            non_empty("AWS_ACCESS_KEY_ID").ok_or(CredentialsError::Missing("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = non_empty("AWS_SECRET_ACCESS_KEY")
            .ok_or(CredentialsError::Missing("AWS_SECRET_ACCESS_KEY"))?;

        Ok(Credentials {
            access_key_id,
            secret_access_key,
            session_token: non_empty("AWS_SESSION_TOKEN"),
            expires_at: None,
        })
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// What a signer gets to see of an outgoing request.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    /// The operation being invoked.
    pub operation: Operation,
    /// Endpoint the request is sent to.
    pub endpoint: &'a str,
    /// Region of the control plane.
    pub region: &'a str,
    /// Serialized request body.
    pub body: &'a [u8],
}

/// Produces authentication headers for an outgoing request.
pub trait RequestSigner: Send + Sync {
    /// Compute the headers that authenticate this request.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be used for signing.
    fn sign(
        &self,
        context: &SigningContext<'_>,
        credentials: &Credentials,
    ) -> Result<HeaderMap, CredentialsError>;
}

/// A signer that attaches nothing, for local endpoints and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedRequests;

impl RequestSigner for UnsignedRequests {
    fn sign(
        &self,
        context: &SigningContext<'_>,
        _credentials: &Credentials,
    ) -> Result<HeaderMap, CredentialsError> {
        tracing::trace!(operation = %context.operation, "Sending unsigned request");
        Ok(HeaderMap::new())
    }
}

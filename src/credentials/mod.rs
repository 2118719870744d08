//! Credential shapes moving through a session's lifetime.
//!
//! Raw secrets arrive as [`CredentialsExternal`], the platform derives a
//! [`CredentialsInternal`] record for the session, and the pair is held as a
//! [`CredentialsFull`] once the vendor has accepted the secrets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

mod converter;

pub use converter::{ConvertError, convert, logical_bucket_name};

/// Opaque session handle supplied by the client layer.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw session number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw session number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse().map(Self)
    }
}

/// Secret material for an S3 (or S3-compatible) account.
#[derive(Clone, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3Secrets {
    /// Access key identifier.
    pub access_key: String,
    /// Secret access key.
    pub secret: String,
    /// Region the account's buckets live in (for example `us-east-1`).
    pub region: String,
    /// Optional STS session token for temporary credentials.
    #[serde(default)]
    pub session_token: Option<String>,
    /// Optional custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl S3Secrets {
    /// Builds secrets from the three mandatory fields.
    #[must_use]
    pub fn new(
        access_key: impl Into<String>,
        secret: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret: secret.into(),
            region: region.into(),
            session_token: None,
            endpoint: None,
        }
    }

    /// Sets a custom S3-compatible endpoint.
    #[must_use]
    pub fn endpoint(mut self, value: Option<String>) -> Self {
        self.endpoint = value;
        self
    }

    /// Returns the vendor endpoint probed during verification.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    fn trimmed(self) -> Self {
        Self {
            access_key: self.access_key.trim().to_owned(),
            secret: self.secret.trim().to_owned(),
            region: self.region.trim().to_owned(),
            session_token: self
                .session_token
                .map(|token| token.trim().to_owned())
                .filter(|token| !token.is_empty()),
            endpoint: self
                .endpoint
                .map(|endpoint| endpoint.trim().to_owned())
                .filter(|endpoint| !endpoint.is_empty()),
        }
    }

    fn first_blank_field(&self) -> Option<&'static str> {
        if self.access_key.is_empty() {
            return Some("accessKey");
        }
        if self.secret.is_empty() {
            return Some("secret");
        }
        if self.region.is_empty() {
            return Some("region");
        }
        None
    }
}

impl fmt::Debug for S3Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Secrets")
            .field("access_key", &self.access_key)
            .field("secret", &"<redacted>")
            .field("region", &self.region)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Provider-shaped secrets supplied by the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialsExternal {
    /// Amazon S3 secrets.
    S3(S3Secrets),
}

impl CredentialsExternal {
    /// Returns the vendor these secrets belong to.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::S3(_) => Provider::S3,
        }
    }
}

/// Platform-derived fields bound to a session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CredentialsInternal {
    /// Session the credentials belong to.
    pub session: SessionId,
    /// Vendor the session stores content with.
    pub provider: Provider,
    /// Physical bucket name resolved for the session.
    pub bucket: String,
}

/// Verified credentials bound to a session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialsFull {
    /// Session-scoped platform fields.
    pub internal: CredentialsInternal,
    /// Vendor secrets accepted by the verification probe.
    pub external: CredentialsExternal,
}

impl CredentialsFull {
    /// Session the credentials are bound to.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.internal.session
    }

    /// Physical bucket name used for the session's content.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.internal.bucket
    }
}

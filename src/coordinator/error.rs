//! Errors raised by the content lifecycle coordinator.

use thiserror::Error;

use crate::credentials::{ConvertError, SessionId};
use crate::failure::FailureClass;
use crate::provider::Provider;
use crate::vendor::VendorError;

/// Errors raised by session transitions and queries.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the vendor rejected the supplied secrets.
    #[error("credentials for session {session} rejected by vendor: {reason}")]
    CredentialsInvalid {
        /// Session whose apply failed.
        session: SessionId,
        /// Vendor-reported reason.
        reason: String,
    },
    /// Raised when no conversion path exists for the provider.
    #[error("provider {provider} is not supported")]
    UnsupportedProvider {
        /// Provider named by the caller.
        provider: Provider,
    },
    /// Raised when the secret payload is missing or cannot be decoded.
    #[error("credentials rejected before verification: {0}")]
    MalformedCredentials(#[source] ConvertError),
    /// Raised when `apply` targets a session that is already active.
    #[error("session {session} is already active")]
    SessionConflict {
        /// Session named by the caller.
        session: SessionId,
    },
    /// Raised when an operation targets a session that is not active.
    #[error("session {session} not found")]
    SessionNotFound {
        /// Session named by the caller.
        session: SessionId,
    },
    /// Raised when the vendor could not be reached during verification.
    #[error("vendor unavailable while verifying session {session}: {source}")]
    VendorUnavailable {
        /// Session whose apply failed.
        session: SessionId,
        /// Transport failure reported by the verifier.
        #[source]
        source: VendorError,
    },
}

impl SessionError {
    /// Maps the error onto the client-facing failure class.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::CredentialsInvalid { .. } => FailureClass::Unauthorized,
            Self::UnsupportedProvider { .. }
            | Self::MalformedCredentials(_)
            | Self::SessionConflict { .. }
            | Self::SessionNotFound { .. } => FailureClass::ClientError,
            Self::VendorUnavailable { .. } => FailureClass::ServerError,
        }
    }
}

impl From<ConvertError> for SessionError {
    fn from(value: ConvertError) -> Self {
        match value {
            ConvertError::UnsupportedProvider(provider) => Self::UnsupportedProvider { provider },
            other @ (ConvertError::MissingPayload { .. } | ConvertError::Malformed { .. }) => {
                Self::MalformedCredentials(other)
            }
        }
    }
}

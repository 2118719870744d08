//! Provider dispatch from raw secret payloads to session credentials.

use serde::Deserialize as _;
use serde_json::Value;
use thiserror::Error;

use super::{CredentialsExternal, CredentialsFull, CredentialsInternal, S3Secrets, SessionId};
use crate::bucket::bucket_name;
use crate::provider::Provider;

/// Errors raised while decoding raw secrets.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConvertError {
    /// Raised when no conversion path exists for the provider.
    #[error("provider {0} is not supported")]
    UnsupportedProvider(Provider),
    /// Raised when the caller supplied no secret payload.
    #[error("no credentials supplied for provider {provider}")]
    MissingPayload {
        /// Provider named by the caller.
        provider: Provider,
    },
    /// Raised when the payload does not decode into the provider's shape.
    #[error("malformed {provider} credentials: {message}")]
    Malformed {
        /// Provider named by the caller.
        provider: Provider,
        /// Decoder or validation message.
        message: String,
    },
}

/// Logical name hashed into the session's physical bucket name.
#[must_use]
pub fn logical_bucket_name(session: SessionId) -> String {
    format!("session-{session}")
}

/// Converts a raw payload into credentials bound to `session`.
///
/// The conversion is pure and performs no network I/O; vendor verification
/// happens separately.
///
/// # Errors
///
/// Returns [`ConvertError::UnsupportedProvider`] for vendors without a
/// decoder, [`ConvertError::MissingPayload`] when `raw` is absent, and
/// [`ConvertError::Malformed`] when decoding or field validation fails.
pub fn convert(
    provider: Provider,
    session: SessionId,
    raw: Option<&Value>,
) -> Result<CredentialsFull, ConvertError> {
    let external = match provider {
        Provider::S3 => CredentialsExternal::S3(decode_s3(raw)?),
        Provider::Gcs => return Err(ConvertError::UnsupportedProvider(provider)),
    };

    Ok(CredentialsFull {
        internal: CredentialsInternal {
            session,
            provider,
            bucket: bucket_name(&logical_bucket_name(session)),
        },
        external,
    })
}

fn decode_s3(raw: Option<&Value>) -> Result<S3Secrets, ConvertError> {
    let payload = raw.ok_or(ConvertError::MissingPayload {
        provider: Provider::S3,
    })?;
    let secrets = S3Secrets::deserialize(payload)
        .map_err(|err| ConvertError::Malformed {
            provider: Provider::S3,
            message: err.to_string(),
        })?
        .trimmed();

    if let Some(field) = secrets.first_blank_field() {
        return Err(ConvertError::Malformed {
            provider: Provider::S3,
            message: format!("{field} must not be empty"),
        });
    }
    Ok(secrets)
}

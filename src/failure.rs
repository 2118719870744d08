//! Coarse classification of failures for client-facing responses.

use serde::Serialize;

/// Response class a failure maps to at the client boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The vendor or platform refused the caller's credentials.
    Unauthorized,
    /// The fault originates in caller input or caller-visible state.
    ClientError,
    /// The fault originates in platform or vendor state.
    ServerError,
}

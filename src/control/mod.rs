//! Remote control of cluster allocations.
//!
//! Every allocation exposes four calls through a [`ControlChannel`]:
//! `suspend`, `serve`, `health_check`, and `version`. The
//! [`AllocationController`] layers the registry lock and the build-identifier
//! check on top of the raw channel. Channels never retry; a transport failure
//! surfaces as [`ControlError::ClusterUnavailable`] on the first attempt.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::failure::FailureClass;
use crate::registry::{ClusterAllocation, RegistryError};

mod controller;
mod http;

pub use controller::AllocationController;
pub use http::{DEFAULT_CONTROL_TIMEOUT, HttpConnector, HttpControlChannel};

/// The four calls of the control contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlCall {
    /// Stop serving content.
    Suspend,
    /// Start serving content.
    Serve,
    /// Liveness probe.
    Health,
    /// Build identifier query.
    Version,
}

impl ControlCall {
    /// Returns the call name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Serve => "serve",
            Self::Health => "health",
            Self::Version => "version",
        }
    }
}

impl std::fmt::Display for ControlCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by control channels and the allocation controller.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ControlError {
    /// Raised when a mutating call finds the allocation already locked.
    #[error("allocation {name} is locked by an outstanding control call")]
    AllocationLocked {
        /// Allocation name.
        name: String,
    },
    /// Raised when the registry has no allocation with the given name.
    #[error("allocation {name} not found")]
    AllocationNotFound {
        /// Allocation name.
        name: String,
    },
    /// Raised when the allocation runs a different build than expected.
    #[error("allocation {name} reports version {reported}, expected {expected}")]
    ClusterVersionMismatch {
        /// Allocation name.
        name: String,
        /// Build identifier the coordinator expects.
        expected: String,
        /// Build identifier the allocation reported.
        reported: String,
    },
    /// Raised when the control endpoint cannot be reached.
    #[error("control endpoint {endpoint} unavailable during {call}: {message}")]
    ClusterUnavailable {
        /// Endpoint that was called.
        endpoint: String,
        /// Call that failed.
        call: ControlCall,
        /// Transport error message.
        message: String,
    },
    /// Raised when the endpoint answers with a non-success status.
    #[error("{call} rejected with status {status}: {body}")]
    Rejected {
        /// Call that was rejected.
        call: ControlCall,
        /// HTTP status code returned by the allocation.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("malformed {call} response: {message}")]
    Protocol {
        /// Call whose response was malformed.
        call: ControlCall,
        /// Decoder message.
        message: String,
    },
    /// Raised when an allocation's control endpoint is not a valid URL.
    #[error("invalid control endpoint '{endpoint}': {message}")]
    InvalidEndpoint {
        /// Endpoint recorded in the allocation context.
        endpoint: String,
        /// Parser message.
        message: String,
    },
}

impl ControlError {
    /// Maps the error onto the client-facing failure class.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::AllocationLocked { .. }
            | Self::AllocationNotFound { .. }
            | Self::InvalidEndpoint { .. } => FailureClass::ClientError,
            Self::ClusterVersionMismatch { .. }
            | Self::ClusterUnavailable { .. }
            | Self::Rejected { .. }
            | Self::Protocol { .. } => FailureClass::ServerError,
        }
    }
}

impl From<RegistryError> for ControlError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::AllocationLocked { name } => Self::AllocationLocked { name },
            RegistryError::AllocationNotFound { name } => Self::AllocationNotFound { name },
        }
    }
}

/// Future returned by control channel operations.
pub type ControlFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ControlError>> + Send + 'a>>;

/// Remote-procedure contract exposed by every allocation.
///
/// `suspend` and `serve` are idempotent on the allocation side. None of the
/// calls take the registry lock; that is the controller's job.
pub trait ControlChannel: Send + Sync {
    /// Stops the allocation serving content.
    fn suspend(&self) -> ControlFuture<'_, ()>;

    /// Starts the allocation serving content.
    fn serve(&self) -> ControlFuture<'_, ()>;

    /// Reports whether the allocation is healthy.
    fn health_check(&self) -> ControlFuture<'_, bool>;

    /// Returns the allocation's build identifier.
    fn version(&self) -> ControlFuture<'_, String>;
}

/// Builds a control channel for a registered allocation.
pub trait ChannelConnector: Send + Sync {
    /// Channel type produced by this connector.
    type Channel: ControlChannel;

    /// Connects to the allocation's control endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidEndpoint`] when the allocation context
    /// cannot be turned into a channel.
    fn connect(&self, allocation: &ClusterAllocation) -> Result<Self::Channel, ControlError>;
}

//! Lock- and version-guarded control of registered allocations.

use tracing::{info, warn};

use super::{ChannelConnector, ControlCall, ControlChannel, ControlError};
use crate::registry::{AllocationRegistry, ServeState};

#[derive(Clone, Copy, Debug)]
enum Mutation {
    Suspend,
    Serve,
}

impl Mutation {
    const fn call(self) -> ControlCall {
        match self {
            Self::Suspend => ControlCall::Suspend,
            Self::Serve => ControlCall::Serve,
        }
    }

    const fn target(self) -> ServeState {
        match self {
            Self::Suspend => ServeState::Suspended,
            Self::Serve => ServeState::Serving,
        }
    }
}

/// Drives control calls against allocations held in a registry.
///
/// `suspend` and `serve` take the allocation lease first, fail fast when it
/// is held, verify the reported build identifier, and only then issue the
/// call. The lease is released on every path. `health_check` and `version`
/// bypass the lease.
#[derive(Debug)]
pub struct AllocationController<C> {
    registry: AllocationRegistry,
    connector: C,
    expected_build: String,
}

impl<C: ChannelConnector> AllocationController<C> {
    /// Creates a controller expecting allocations to run `expected_build`.
    #[must_use]
    pub fn new(
        registry: AllocationRegistry,
        connector: C,
        expected_build: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            connector,
            expected_build: expected_build.into(),
        }
    }

    /// Registry the controller resolves allocation names against.
    #[must_use]
    pub const fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    /// Build identifier allocations must report before mutating calls.
    #[must_use]
    pub fn expected_build(&self) -> &str {
        &self.expected_build
    }

    /// Suspends the named allocation.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AllocationLocked`] when another call holds the
    /// lease, [`ControlError::ClusterVersionMismatch`] when the allocation
    /// runs another build, and transport errors from the channel.
    pub async fn suspend(&self, name: &str) -> Result<(), ControlError> {
        self.mutate(name, Mutation::Suspend).await
    }

    /// Puts the named allocation into service.
    ///
    /// # Errors
    ///
    /// Same as [`AllocationController::suspend`].
    pub async fn serve(&self, name: &str) -> Result<(), ControlError> {
        self.mutate(name, Mutation::Serve).await
    }

    /// Queries the allocation's health without taking the lease.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AllocationNotFound`] for unknown names and
    /// transport errors from the channel.
    pub async fn health_check(&self, name: &str) -> Result<bool, ControlError> {
        let allocation = self.registry.get(name)?;
        let channel = self.connector.connect(&allocation)?;
        channel.health_check().await
    }

    /// Queries the allocation's build identifier without taking the lease.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AllocationNotFound`] for unknown names and
    /// transport errors from the channel.
    pub async fn version(&self, name: &str) -> Result<String, ControlError> {
        let allocation = self.registry.get(name)?;
        let channel = self.connector.connect(&allocation)?;
        channel.version().await
    }

    async fn mutate(&self, name: &str, mutation: Mutation) -> Result<(), ControlError> {
        let call = mutation.call();
        let lease = self.registry.try_lock(name)?;
        let allocation = self.registry.get(name)?;
        let channel = self.connector.connect(&allocation)?;

        let reported = channel.version().await?;
        if reported != self.expected_build {
            warn!(
                allocation = %name,
                expected = %self.expected_build,
                %reported,
                %call,
                "refusing control call on mismatched build"
            );
            return Err(ControlError::ClusterVersionMismatch {
                name: name.to_owned(),
                expected: self.expected_build.clone(),
                reported,
            });
        }

        match mutation {
            Mutation::Suspend => channel.suspend().await?,
            Mutation::Serve => channel.serve().await?,
        }
        self.registry.record_serve_state(name, mutation.target())?;
        info!(allocation = %name, %call, "control call completed");
        lease.release();
        Ok(())
    }
}

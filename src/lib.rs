//! Core library for the Stowage storage session broker.
//!
//! Clients hand the broker vendor secrets for a session. The
//! [`Coordinator`] converts and verifies them, binds them to the session,
//! and resolves a cluster allocation through the [`AllocationRegistry`].
//! Allocations are driven through a [`ControlChannel`] by the
//! [`AllocationController`], which holds the allocation lock and checks the
//! allocation's build identifier before suspend or serve. A
//! [`BackupScheduler`] snapshots coordinator state on a fixed delay.

pub mod backup;
pub mod bucket;
pub mod config;
pub mod context;
pub mod control;
pub mod coordinator;
pub mod credentials;
pub mod failure;
pub mod provider;
pub mod registry;
pub mod test_support;
pub mod usage;
pub mod vendor;

pub use backup::{
    BackupError, BackupPeriod, BackupScheduler, DirectorySnapshotter, SnapshotSource, Snapshotter,
};
pub use bucket::{BUCKET_NAME_LEN, bucket_name};
pub use config::{ConfigError, StowageConfig};
pub use context::PlatformContext;
pub use control::{
    AllocationController, ChannelConnector, ControlCall, ControlChannel, ControlError,
    HttpConnector, HttpControlChannel,
};
pub use coordinator::{
    ApplyRequest, CleanOutcome, Coordinator, CoordinatorSnapshot, Selector, SessionError,
    SessionView,
};
pub use credentials::{
    ConvertError, CredentialsExternal, CredentialsFull, CredentialsInternal, S3Secrets,
    SessionId, convert,
};
pub use failure::FailureClass;
pub use provider::Provider;
pub use registry::{
    AllocationContext, AllocationLease, AllocationRegistry, ClusterAllocation, Location,
    RegistryError, ServeState, WorkspaceUnitKey,
};
pub use usage::UsageWatcher;
pub use vendor::{S3Verifier, VendorError, VendorVerifier, Verdict};

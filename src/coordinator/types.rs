//! Requests, selectors, and read-only views of coordinator state.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::credentials::{SessionId, logical_bucket_name};
use crate::provider::Provider;
use crate::registry::{AllocationContext, Location, WorkspaceUnitKey};

/// Input to [`crate::coordinator::Coordinator::apply`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyRequest {
    pub(crate) session: SessionId,
    pub(crate) provider: Provider,
    pub(crate) credentials: Option<Value>,
    pub(crate) workspace: WorkspaceUnitKey,
    pub(crate) locations: Vec<Location>,
    pub(crate) context: AllocationContext,
}

impl ApplyRequest {
    /// Creates a request binding `credentials` to `session`.
    ///
    /// The workspace defaults to the session's logical bucket name, so each
    /// session gets its own allocation unless a workspace is set.
    #[must_use]
    pub fn new(session: SessionId, provider: Provider, credentials: Option<Value>) -> Self {
        Self {
            session,
            provider,
            credentials,
            workspace: WorkspaceUnitKey::new(logical_bucket_name(session)),
            locations: Vec::new(),
            context: AllocationContext::default(),
        }
    }

    /// Sets the workspace the session's allocation is bound to.
    #[must_use]
    pub fn workspace(mut self, workspace: impl Into<WorkspaceUnitKey>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Appends a location served by the allocation.
    #[must_use]
    pub fn location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Sets the control endpoint context used when a new allocation is made.
    #[must_use]
    pub fn context(mut self, context: AllocationContext) -> Self {
        self.context = context;
        self
    }

    /// Session the request targets.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }
}

/// Scope of a [`crate::coordinator::Coordinator::clean`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector {
    /// Every object; also closes the session.
    All,
    /// Objects whose key starts with the prefix.
    Prefix(String),
    /// Objects with exactly these keys.
    Keys(BTreeSet<String>),
}

impl Selector {
    /// Builds a key selector from any iterator of keys.
    #[must_use]
    pub fn keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Returns `true` when `key` falls inside the selection.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Self::Keys(keys) => keys.contains(key),
        }
    }

    /// Returns `true` when cleaning with this selector ends the session.
    #[must_use]
    pub const fn covers_session(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// One content object registered on a session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ObjectEntry {
    /// Object key inside the session bucket.
    pub key: String,
    /// Object size in bytes.
    pub size_bytes: u64,
}

/// Read-only view of an active session. Carries no secrets.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub session: SessionId,
    /// Vendor holding the session's content.
    pub provider: Provider,
    /// Physical bucket name.
    pub bucket: String,
    /// Allocation serving the session.
    pub allocation: String,
    /// Registered objects, ordered by key.
    pub objects: Vec<ObjectEntry>,
}

/// Result of a [`crate::coordinator::Coordinator::clean`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanOutcome {
    /// Keys removed by this call, in order.
    pub removed: Vec<String>,
    /// `true` when the session transitioned to inactive.
    pub session_closed: bool,
}

/// Serialisable state of every active session.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    /// Active sessions, ordered by id.
    pub sessions: Vec<SessionView>,
}

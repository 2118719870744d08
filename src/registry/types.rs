//! Records held by the allocation registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Identifier grouping allocations under one logical workspace.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct WorkspaceUnitKey(String);

impl WorkspaceUnitKey {
    /// Wraps a workspace identifier, trimming surrounding whitespace.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for WorkspaceUnitKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkspaceUnitKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for WorkspaceUnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Endpoint an allocation serves content to or from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Location {
    /// URI of the destination (for example `s3://bucket/prefix`).
    pub uri: String,
}

impl Location {
    /// Creates a location from a URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Connection details used to reach an allocation's control endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AllocationContext {
    /// Base URL of the allocation's control endpoint.
    pub endpoint: String,
    /// Free-form labels attached at provisioning time.
    pub labels: BTreeMap<String, String>,
}

impl AllocationContext {
    /// Creates a context for the given control endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Attaches a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Last serve state confirmed through the control channel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServeState {
    /// No suspend or serve call has completed yet.
    #[default]
    Unknown,
    /// The allocation is serving content.
    Serving,
    /// The allocation is suspended.
    Suspended,
}

/// A provisioned worker allocation bound to a workspace.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ClusterAllocation {
    /// Registry-assigned allocation name.
    pub name: String,
    /// `true` while a suspend or serve call is outstanding.
    pub locked: bool,
    /// Workspace the allocation belongs to.
    pub workspace_unit_key: WorkspaceUnitKey,
    /// Destinations served by the allocation, in priority order.
    pub locations: Vec<Location>,
    /// Worker process id once reported.
    pub pid: Option<u32>,
    /// Control endpoint details.
    pub context: AllocationContext,
    /// Last confirmed serve state.
    pub serve_state: ServeState,
}

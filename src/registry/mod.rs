//! Registry of cluster allocations and their lock state.
//!
//! Allocations are stored in a map keyed by name, with a secondary index from
//! workspace unit key to name. The registry never performs remote calls; it
//! hands out [`AllocationLease`] guards that hold an allocation's `locked`
//! flag for the duration of a control call and clear it when dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

mod lease;
mod types;

pub use lease::AllocationLease;
pub use types::{AllocationContext, ClusterAllocation, Location, ServeState, WorkspaceUnitKey};

/// Prefix applied to every allocation name.
pub const ALLOCATION_NAME_PREFIX: &str = "stowage-";

/// Errors raised by registry lookups and lock operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// Raised when no allocation carries the given name.
    #[error("allocation {name} not found")]
    AllocationNotFound {
        /// Allocation name passed by the caller.
        name: String,
    },
    /// Raised when a control call already holds the allocation's lock.
    #[error("allocation {name} is locked by an outstanding control call")]
    AllocationLocked {
        /// Allocation name passed by the caller.
        name: String,
    },
}

#[derive(Debug, Default)]
struct RegistryState {
    allocations: HashMap<String, ClusterAllocation>,
    by_workspace: HashMap<WorkspaceUnitKey, String>,
}

impl RegistryState {
    fn entry_mut(&mut self, name: &str) -> Result<&mut ClusterAllocation, RegistryError> {
        self.allocations
            .get_mut(name)
            .ok_or_else(|| RegistryError::AllocationNotFound {
                name: name.to_owned(),
            })
    }
}

/// Shared, cloneable handle to the allocation registry.
#[derive(Clone, Debug, Default)]
pub struct AllocationRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl AllocationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the allocation for `key`, creating an unlocked one when none
    /// exists. Locations and context of an existing allocation are kept.
    pub fn allocate(
        &self,
        key: &WorkspaceUnitKey,
        locations: Vec<Location>,
        context: AllocationContext,
    ) -> ClusterAllocation {
        let mut state = self.state();
        if let Some(existing) = state
            .by_workspace
            .get(key)
            .and_then(|name| state.allocations.get(name))
        {
            debug!(allocation = %existing.name, workspace = %key, "reusing allocation");
            return existing.clone();
        }

        let allocation = ClusterAllocation {
            name: format!("{ALLOCATION_NAME_PREFIX}{}", Uuid::new_v4().simple()),
            locked: false,
            workspace_unit_key: key.clone(),
            locations,
            pid: None,
            context,
            serve_state: ServeState::Unknown,
        };
        info!(allocation = %allocation.name, workspace = %key, "allocation created");
        state
            .by_workspace
            .insert(key.clone(), allocation.name.clone());
        state
            .allocations
            .insert(allocation.name.clone(), allocation.clone());
        allocation
    }

    /// Removes the named allocation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AllocationNotFound`] when the name is unknown
    /// and [`RegistryError::AllocationLocked`] while a control call holds the
    /// allocation.
    pub fn deallocate(&self, name: &str) -> Result<ClusterAllocation, RegistryError> {
        let mut state = self.state();
        if state.entry_mut(name)?.locked {
            return Err(RegistryError::AllocationLocked {
                name: name.to_owned(),
            });
        }
        let removed = state
            .allocations
            .remove(name)
            .ok_or_else(|| RegistryError::AllocationNotFound {
                name: name.to_owned(),
            })?;
        state.by_workspace.remove(&removed.workspace_unit_key);
        info!(allocation = %name, "allocation removed");
        Ok(removed)
    }

    /// Returns a copy of the named allocation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AllocationNotFound`] when the name is unknown.
    pub fn get(&self, name: &str) -> Result<ClusterAllocation, RegistryError> {
        self.state()
            .allocations
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::AllocationNotFound {
                name: name.to_owned(),
            })
    }

    /// Returns the allocation bound to a workspace, if any.
    #[must_use]
    pub fn find_by_workspace(&self, key: &WorkspaceUnitKey) -> Option<ClusterAllocation> {
        let state = self.state();
        state
            .by_workspace
            .get(key)
            .and_then(|name| state.allocations.get(name))
            .cloned()
    }

    /// Returns every allocation, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<ClusterAllocation> {
        let mut allocations: Vec<_> = self.state().allocations.values().cloned().collect();
        allocations.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
        allocations
    }

    /// Attempts to take the allocation's lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AllocationLocked`] when the lock is already
    /// held and [`RegistryError::AllocationNotFound`] for unknown names.
    pub fn try_lock(&self, name: &str) -> Result<AllocationLease, RegistryError> {
        let mut state = self.state();
        let allocation = state.entry_mut(name)?;
        if allocation.locked {
            debug!(allocation = %name, "lock contended");
            return Err(RegistryError::AllocationLocked {
                name: name.to_owned(),
            });
        }
        allocation.locked = true;
        debug!(allocation = %name, "lock acquired");
        Ok(AllocationLease::new(self.clone(), name.to_owned()))
    }

    /// Reports whether a control call currently holds the allocation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AllocationNotFound`] for unknown names.
    pub fn is_locked(&self, name: &str) -> Result<bool, RegistryError> {
        self.get(name).map(|allocation| allocation.locked)
    }

    /// Records the worker process id reported by the allocation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AllocationNotFound`] for unknown names.
    pub fn record_pid(&self, name: &str, pid: u32) -> Result<(), RegistryError> {
        self.state().entry_mut(name)?.pid = Some(pid);
        Ok(())
    }

    /// Records the serve state confirmed by a completed control call.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AllocationNotFound`] for unknown names.
    pub fn record_serve_state(
        &self,
        name: &str,
        serve_state: ServeState,
    ) -> Result<(), RegistryError> {
        self.state().entry_mut(name)?.serve_state = serve_state;
        Ok(())
    }

    fn unlock(&self, name: &str) {
        // The allocation cannot be removed while locked, so it is present.
        if let Ok(allocation) = self.state().entry_mut(name) {
            allocation.locked = false;
            debug!(allocation = %name, "lock released");
        }
    }
}

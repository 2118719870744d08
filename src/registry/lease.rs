//! Scoped ownership of an allocation's lock.

use super::AllocationRegistry;

/// Holds an allocation's `locked` flag until dropped or released.
#[derive(Debug)]
#[must_use = "dropping the lease releases the allocation lock immediately"]
pub struct AllocationLease {
    registry: AllocationRegistry,
    name: String,
}

impl AllocationLease {
    pub(super) const fn new(registry: AllocationRegistry, name: String) -> Self {
        Self { registry, name }
    }

    /// Name of the locked allocation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Releases the lock now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AllocationLease {
    fn drop(&mut self) {
        self.registry.unlock(&self.name);
    }
}

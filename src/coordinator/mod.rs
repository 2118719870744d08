//! Content lifecycle coordinator.
//!
//! Each session moves `NONE → ACTIVE` on a successful [`Coordinator::apply`]
//! and back to `NONE` on [`Coordinator::withdraw`] or a
//! [`Coordinator::clean`] whose selector covers the whole session. The
//! coordinator delegates conversion and verification, binds the verified
//! credentials to the session, and resolves the session's allocation through
//! the registry. It never talks to the vendor's data plane.
//!
//! The session table is one mutex over a map. It is never held across an
//! `await`, so verification of one session does not block another.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::credentials::{CredentialsFull, SessionId, convert};
use crate::registry::AllocationRegistry;
use crate::usage::UsageWatcher;
use crate::vendor::{VendorVerifier, Verdict};

mod error;
mod types;

pub use error::SessionError;
pub use types::{
    ApplyRequest, CleanOutcome, CoordinatorSnapshot, ObjectEntry, Selector, SessionView,
};

#[derive(Debug)]
struct SessionEntry {
    credentials: CredentialsFull,
    allocation: String,
    objects: BTreeMap<String, u64>,
}

impl SessionEntry {
    fn view(&self) -> SessionView {
        SessionView {
            session: self.credentials.session(),
            provider: self.credentials.internal.provider,
            bucket: self.credentials.bucket().to_owned(),
            allocation: self.allocation.clone(),
            objects: self
                .objects
                .iter()
                .map(|(key, size_bytes)| ObjectEntry {
                    key: key.clone(),
                    size_bytes: *size_bytes,
                })
                .collect(),
        }
    }
}

/// Owns the per-session state machine and the credential binding table.
#[derive(Debug)]
pub struct Coordinator<V> {
    verifier: V,
    registry: AllocationRegistry,
    usage: Arc<UsageWatcher>,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl<V: VendorVerifier> Coordinator<V> {
    /// Creates a coordinator with no active sessions.
    #[must_use]
    pub fn new(verifier: V, registry: AllocationRegistry, usage: Arc<UsageWatcher>) -> Self {
        Self {
            verifier,
            registry,
            usage,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Registry sessions resolve their allocations against.
    #[must_use]
    pub const fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Converts, verifies, and binds credentials to a new session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionConflict`] when the session is already
    /// active (the existing binding is left untouched),
    /// [`SessionError::UnsupportedProvider`] or
    /// [`SessionError::MalformedCredentials`] when conversion fails,
    /// [`SessionError::CredentialsInvalid`] when the vendor rejects the
    /// secrets, and [`SessionError::VendorUnavailable`] when the vendor
    /// cannot be reached.
    pub async fn apply(&self, request: ApplyRequest) -> Result<SessionId, SessionError> {
        let ApplyRequest {
            session,
            provider,
            credentials,
            workspace,
            locations,
            context,
        } = request;

        if self.sessions().contains_key(&session) {
            debug!(%session, "apply rejected: session already active");
            return Err(SessionError::SessionConflict { session });
        }

        let full = convert(provider, session, credentials.as_ref())?;
        match self.verifier.verify(&full.external).await {
            Ok(Verdict::Valid) => {}
            Ok(Verdict::Invalid { reason }) => {
                warn!(%session, %provider, %reason, "vendor rejected credentials");
                return Err(SessionError::CredentialsInvalid { session, reason });
            }
            Err(source) => {
                warn!(%session, %provider, error = %source, "vendor unreachable");
                return Err(SessionError::VendorUnavailable { session, source });
            }
        }

        // Lock order: session table, then registry.
        let mut sessions = self.sessions();
        match sessions.entry(session) {
            Entry::Occupied(_) => {
                debug!(%session, "apply lost race: session became active during verification");
                Err(SessionError::SessionConflict { session })
            }
            Entry::Vacant(slot) => {
                let allocation = self.registry.allocate(&workspace, locations, context);
                info!(
                    %session,
                    %provider,
                    bucket = %full.bucket(),
                    allocation = %allocation.name,
                    "session applied"
                );
                slot.insert(SessionEntry {
                    credentials: full,
                    allocation: allocation.name,
                    objects: BTreeMap::new(),
                });
                Ok(session)
            }
        }
    }

    /// Ends the session. Withdrawing an inactive session is a no-op.
    pub fn withdraw(&self, session: SessionId) {
        if self.sessions().remove(&session).is_some() {
            info!(%session, "session withdrawn");
        } else {
            debug!(%session, "withdraw on inactive session ignored");
        }
    }

    /// Removes the session's objects matched by `selector`.
    ///
    /// Only [`Selector::All`] ends the session; narrower selectors may be
    /// applied repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] when the session is not
    /// active.
    pub fn clean(
        &self,
        session: SessionId,
        selector: &Selector,
    ) -> Result<CleanOutcome, SessionError> {
        let mut sessions = self.sessions();
        let entry = sessions
            .get_mut(&session)
            .ok_or(SessionError::SessionNotFound { session })?;

        let removed: Vec<String> = entry
            .objects
            .keys()
            .filter(|key| selector.matches(key))
            .cloned()
            .collect();
        for key in &removed {
            entry.objects.remove(key);
        }

        let session_closed = selector.covers_session();
        if session_closed {
            sessions.remove(&session);
        }
        info!(%session, removed = removed.len(), session_closed, "session cleaned");
        Ok(CleanOutcome {
            removed,
            session_closed,
        })
    }

    /// Returns a read-only view of the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] when the session is not
    /// active.
    pub fn get(&self, session: SessionId) -> Result<SessionView, SessionError> {
        self.sessions()
            .get(&session)
            .map(SessionEntry::view)
            .ok_or(SessionError::SessionNotFound { session })
    }

    /// Returns the credentials bound to the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] when the session is not
    /// active.
    pub fn credentials(&self, session: SessionId) -> Result<CredentialsFull, SessionError> {
        self.sessions()
            .get(&session)
            .map(|entry| entry.credentials.clone())
            .ok_or(SessionError::SessionNotFound { session })
    }

    /// Registers an uploaded object on the session and counts it.
    ///
    /// Re-registering a key replaces its recorded size.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] when the session is not
    /// active.
    pub fn record_upload(
        &self,
        session: SessionId,
        key: &str,
        size_bytes: u64,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        let entry = sessions
            .get_mut(&session)
            .ok_or(SessionError::SessionNotFound { session })?;
        entry.objects.insert(key.to_owned(), size_bytes);
        self.usage.record_upload(size_bytes);
        debug!(%session, key, size_bytes, "object registered");
        Ok(())
    }

    /// Active sessions, ordered by id.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Captures every active session without secrets.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let mut sessions: Vec<_> = self.sessions().values().map(SessionEntry::view).collect();
        sessions.sort_by_key(|view| view.session);
        CoordinatorSnapshot { sessions }
    }
}

#[cfg(test)]
mod tests;

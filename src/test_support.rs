//! Test support utilities shared across unit and integration tests.
//!
//! The doubles here stand in for the two remote seams of the crate: vendor
//! verification ([`ScriptedVerifier`]) and allocation control
//! ([`FakeChannel`] behind a [`FakeConnector`]). [`MemorySnapshotter`]
//! replaces the on-disk backup target.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{Mutex, MutexGuard, Notify, Semaphore};

use crate::backup::{BackupError, SnapshotFuture, Snapshotter};
use crate::control::{ChannelConnector, ControlCall, ControlChannel, ControlError, ControlFuture};
use crate::coordinator::CoordinatorSnapshot;
use crate::credentials::CredentialsExternal;
use crate::registry::{ClusterAllocation, ServeState};
use crate::vendor::{VendorError, VendorFuture, VendorVerifier, Verdict};

fn lock<T>(mutex: &StdMutex<T>) -> StdMutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Verifier that replays scripted outcomes, then falls back to a fixed one.
#[derive(Clone, Debug)]
pub struct ScriptedVerifier {
    scripted: Arc<StdMutex<VecDeque<Result<Verdict, VendorError>>>>,
    fallback: Result<Verdict, VendorError>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedVerifier {
    fn with_fallback(fallback: Result<Verdict, VendorError>) -> Self {
        Self {
            scripted: Arc::default(),
            fallback,
            calls: Arc::default(),
        }
    }

    /// Verifier that accepts every credential set.
    #[must_use]
    pub fn accepting() -> Self {
        Self::with_fallback(Ok(Verdict::Valid))
    }

    /// Verifier that rejects every credential set with `reason`.
    #[must_use]
    pub fn rejecting(reason: &str) -> Self {
        Self::with_fallback(Ok(Verdict::Invalid {
            reason: reason.to_owned(),
        }))
    }

    /// Verifier whose vendor endpoint can never be reached.
    #[must_use]
    pub fn unreachable(endpoint: &str) -> Self {
        Self::with_fallback(Err(VendorError::Unreachable {
            endpoint: endpoint.to_owned(),
            message: String::from("connection refused"),
        }))
    }

    /// Queues an outcome returned before the fallback.
    pub fn push(&self, outcome: Result<Verdict, VendorError>) {
        lock(&self.scripted).push_back(outcome);
    }

    /// Number of verifications performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VendorVerifier for ScriptedVerifier {
    fn verify<'a>(&'a self, _credentials: &'a CredentialsExternal) -> VendorFuture<'a, Verdict> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = lock(&self.scripted).pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        })
    }
}

#[derive(Debug)]
struct FakeAllocationState {
    version: StdMutex<String>,
    healthy: AtomicBool,
    serve_state: StdMutex<ServeState>,
    unreachable: AtomicBool,
    held: AtomicBool,
    gate: Semaphore,
    entered: Notify,
    suspend_calls: AtomicUsize,
    serve_calls: AtomicUsize,
}

/// In-memory allocation answering control calls.
///
/// Clones share state, so a test can keep one handle while the controller
/// drives another. Suspend and serve are idempotent, as on a real
/// allocation.
#[derive(Clone, Debug)]
pub struct FakeChannel {
    state: Arc<FakeAllocationState>,
}

impl FakeChannel {
    /// Creates a healthy allocation running `version`.
    #[must_use]
    pub fn new(version: &str) -> Self {
        Self {
            state: Arc::new(FakeAllocationState {
                version: StdMutex::new(version.to_owned()),
                healthy: AtomicBool::new(true),
                serve_state: StdMutex::new(ServeState::Unknown),
                unreachable: AtomicBool::new(false),
                held: AtomicBool::new(false),
                gate: Semaphore::new(0),
                entered: Notify::new(),
                suspend_calls: AtomicUsize::new(0),
                serve_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Changes the reported build identifier.
    pub fn set_version(&self, version: &str) {
        *lock(&self.state.version) = version.to_owned();
    }

    /// Changes the reported health.
    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Makes every subsequent call fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Serve state the allocation currently holds.
    #[must_use]
    pub fn serve_state(&self) -> ServeState {
        *lock(&self.state.serve_state)
    }

    /// Number of suspend calls that reached the allocation.
    #[must_use]
    pub fn suspend_calls(&self) -> usize {
        self.state.suspend_calls.load(Ordering::SeqCst)
    }

    /// Number of serve calls that reached the allocation.
    #[must_use]
    pub fn serve_calls(&self) -> usize {
        self.state.serve_calls.load(Ordering::SeqCst)
    }

    /// Parks every subsequent suspend or serve until
    /// [`FakeChannel::release_mutations`] is called.
    pub fn hold_mutations(&self) {
        self.state.held.store(true, Ordering::SeqCst);
    }

    /// Lets one parked mutation complete and stops parking new ones.
    pub fn release_mutations(&self) {
        self.state.held.store(false, Ordering::SeqCst);
        self.state.gate.add_permits(1);
    }

    /// Waits until a held mutation has reached the allocation.
    pub async fn wait_for_held_mutation(&self) {
        self.state.entered.notified().await;
    }

    fn unavailable(&self, call: ControlCall) -> Result<(), ControlError> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ControlError::ClusterUnavailable {
                endpoint: String::from("fake://allocation"),
                call,
                message: String::from("connection refused"),
            });
        }
        Ok(())
    }

    async fn mutate(&self, call: ControlCall, target: ServeState) -> Result<(), ControlError> {
        self.unavailable(call)?;
        if self.state.held.load(Ordering::SeqCst) {
            self.state.entered.notify_one();
            if let Ok(permit) = self.state.gate.acquire().await {
                permit.forget();
            }
        }
        let counter = match call {
            ControlCall::Suspend => &self.state.suspend_calls,
            _ => &self.state.serve_calls,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state.serve_state) = target;
        Ok(())
    }
}

impl ControlChannel for FakeChannel {
    fn suspend(&self) -> ControlFuture<'_, ()> {
        Box::pin(self.mutate(ControlCall::Suspend, ServeState::Suspended))
    }

    fn serve(&self) -> ControlFuture<'_, ()> {
        Box::pin(self.mutate(ControlCall::Serve, ServeState::Serving))
    }

    fn health_check(&self) -> ControlFuture<'_, bool> {
        Box::pin(async move {
            self.unavailable(ControlCall::Health)?;
            Ok(self.state.healthy.load(Ordering::SeqCst))
        })
    }

    fn version(&self) -> ControlFuture<'_, String> {
        Box::pin(async move {
            self.unavailable(ControlCall::Version)?;
            Ok(lock(&self.state.version).clone())
        })
    }
}

/// Connector resolving allocations to [`FakeChannel`]s by control endpoint.
#[derive(Clone, Debug)]
pub struct FakeConnector {
    fallback: FakeChannel,
    by_endpoint: Arc<StdMutex<HashMap<String, FakeChannel>>>,
}

impl FakeConnector {
    /// Creates a connector that hands out `fallback` for unknown endpoints.
    #[must_use]
    pub fn new(fallback: FakeChannel) -> Self {
        Self {
            fallback,
            by_endpoint: Arc::default(),
        }
    }

    /// Routes allocations whose endpoint is `endpoint` to `channel`.
    pub fn register(&self, endpoint: &str, channel: FakeChannel) {
        lock(&self.by_endpoint).insert(endpoint.to_owned(), channel);
    }
}

impl ChannelConnector for FakeConnector {
    type Channel = FakeChannel;

    fn connect(&self, allocation: &ClusterAllocation) -> Result<Self::Channel, ControlError> {
        Ok(lock(&self.by_endpoint)
            .get(&allocation.context.endpoint)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Snapshotter keeping every snapshot in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySnapshotter {
    taken: Arc<StdMutex<Vec<CoordinatorSnapshot>>>,
    failures: Arc<AtomicUsize>,
}

impl MemorySnapshotter {
    /// Creates an empty snapshotter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` snapshots fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Snapshots written so far.
    #[must_use]
    pub fn taken(&self) -> Vec<CoordinatorSnapshot> {
        lock(&self.taken).clone()
    }
}

impl Snapshotter for MemorySnapshotter {
    fn write(&self, snapshot: CoordinatorSnapshot) -> SnapshotFuture<'_> {
        Box::pin(async move {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(BackupError::Snapshot {
                    message: String::from("simulated snapshot failure"),
                });
            }
            lock(&self.taken).push(snapshot);
            Ok(())
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

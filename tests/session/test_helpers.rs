//! Shared fixtures and helpers for session lifecycle scenarios.

use std::sync::Arc;

use rstest::fixture;
use serde_json::{Value, json};
use stowage::test_support::{FakeChannel, FakeConnector, ScriptedVerifier};
use stowage::{
    AllocationController, AllocationRegistry, ControlError, Coordinator, SessionError, SessionId,
    UsageWatcher,
};

use crate::test_constants::{ACCESS_KEY, EXPECTED_BUILD, REGION, SECRET_KEY};

/// Recorded result of one `apply` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    Bound(SessionId),
    Failed { kind: &'static str, message: String },
}

impl From<Result<SessionId, SessionError>> for ApplyOutcome {
    fn from(result: Result<SessionId, SessionError>) -> Self {
        match result {
            Ok(session) => Self::Bound(session),
            Err(err) => Self::Failed {
                kind: session_error_kind(&err),
                message: err.to_string(),
            },
        }
    }
}

/// Recorded result of one control call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlOutcome {
    Healthy(bool),
    Done,
    Failed { kind: &'static str, message: String },
}

impl ControlOutcome {
    fn failed(err: &ControlError) -> Self {
        Self::Failed {
            kind: control_error_kind(err),
            message: err.to_string(),
        }
    }

    pub fn from_health(result: Result<bool, ControlError>) -> Self {
        result.map_or_else(|err| Self::failed(&err), Self::Healthy)
    }

    pub fn from_mutation(result: Result<(), ControlError>) -> Self {
        result.map_or_else(|err| Self::failed(&err), |()| Self::Done)
    }
}

/// State threaded through the steps of one scenario.
///
/// Steps borrow the context mutably rather than returning it, so the live
/// coordinator and fakes never pass through step return values.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub verifier: ScriptedVerifier,
    pub coordinator: Option<Arc<Coordinator<ScriptedVerifier>>>,
    pub controller: Option<Arc<AllocationController<FakeConnector>>>,
    pub channel: FakeChannel,
    pub applies: Vec<ApplyOutcome>,
    pub control: Option<ControlOutcome>,
    pub health: Option<ControlOutcome>,
}

#[fixture]
pub fn session_context() -> SessionContext {
    SessionContext {
        verifier: ScriptedVerifier::accepting(),
        coordinator: None,
        controller: None,
        channel: FakeChannel::new(EXPECTED_BUILD),
        applies: Vec::new(),
        control: None,
        health: None,
    }
}

impl SessionContext {
    /// Wires a coordinator and a controller over one shared registry.
    pub fn wire(&mut self, verifier: ScriptedVerifier) {
        let registry = AllocationRegistry::new();
        let coordinator = Coordinator::new(
            verifier.clone(),
            registry.clone(),
            Arc::new(UsageWatcher::new()),
        );
        let controller = AllocationController::new(
            registry,
            FakeConnector::new(self.channel.clone()),
            EXPECTED_BUILD,
        );
        self.verifier = verifier;
        self.coordinator = Some(Arc::new(coordinator));
        self.controller = Some(Arc::new(controller));
    }

    pub fn coordinator(&self) -> &Coordinator<ScriptedVerifier> {
        self.coordinator
            .as_deref()
            .unwrap_or_else(|| panic!("test setup requires a coordinator"))
    }

    pub fn controller(&self) -> &AllocationController<FakeConnector> {
        self.controller
            .as_deref()
            .unwrap_or_else(|| panic!("test setup requires a controller"))
    }

    /// Name of the allocation the active session is bound to.
    pub fn allocation_of(&self, session: u64) -> String {
        self.coordinator()
            .get(SessionId::new(session))
            .unwrap_or_else(|err| panic!("session {session} should be active: {err}"))
            .allocation
    }
}

pub fn s3_payload() -> Value {
    json!({
        "accessKey": ACCESS_KEY,
        "secret": SECRET_KEY,
        "region": REGION,
    })
}

pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new()
        .unwrap_or_else(|err| panic!("create runtime: {err}"))
        .block_on(future)
}

/// Variant name used by the feature files to refer to a session error.
pub const fn session_error_kind(err: &SessionError) -> &'static str {
    match err {
        SessionError::CredentialsInvalid { .. } => "CredentialsInvalid",
        SessionError::UnsupportedProvider { .. } => "UnsupportedProvider",
        SessionError::MalformedCredentials(_) => "MalformedCredentials",
        SessionError::SessionConflict { .. } => "SessionConflict",
        SessionError::SessionNotFound { .. } => "SessionNotFound",
        SessionError::VendorUnavailable { .. } => "VendorUnavailable",
    }
}

/// Variant name used by the feature files to refer to a control error.
pub const fn control_error_kind(err: &ControlError) -> &'static str {
    match err {
        ControlError::AllocationNotFound { .. } => "AllocationNotFound",
        ControlError::AllocationLocked { .. } => "AllocationLocked",
        ControlError::ClusterVersionMismatch { .. } => "ClusterVersionMismatch",
        _ => "Other",
    }
}

//! BDD step definitions for the session lifecycle.

use rstest_bdd_macros::{given, then, when};
use stowage::test_support::ScriptedVerifier;
use stowage::{ApplyRequest, Provider, SessionId};

use super::test_helpers::{ApplyOutcome, ControlOutcome, SessionContext, block_on, s3_payload};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a coordinator whose vendor accepts credentials")]
fn vendor_accepts(session_context: &mut SessionContext) {
    session_context.wire(ScriptedVerifier::accepting());
}

#[given("a coordinator whose vendor rejects credentials with \"{reason}\"")]
fn vendor_rejects(session_context: &mut SessionContext, reason: String) {
    session_context.wire(ScriptedVerifier::rejecting(reason.trim()));
}

#[given("allocations report build \"{build}\"")]
fn allocations_report_build(session_context: &mut SessionContext, build: String) {
    session_context.channel.set_version(build.trim());
}

#[when("session {session:u64} is applied with S3 credentials")]
fn apply_s3(session_context: &mut SessionContext, session: u64) {
    let request = ApplyRequest::new(SessionId::new(session), Provider::S3, Some(s3_payload()));
    let outcome = block_on(session_context.coordinator().apply(request));
    session_context.applies.push(ApplyOutcome::from(outcome));
}

#[when("session {session:u64} is applied with GCS credentials")]
fn apply_gcs(session_context: &mut SessionContext, session: u64) {
    let request = ApplyRequest::new(
        SessionId::new(session),
        Provider::Gcs,
        Some(serde_json::json!({ "type": "service_account" })),
    );
    let outcome = block_on(session_context.coordinator().apply(request));
    session_context.applies.push(ApplyOutcome::from(outcome));
}

#[when("session {session:u64} is withdrawn")]
fn withdraw(session_context: &mut SessionContext, session: u64) {
    session_context
        .coordinator()
        .withdraw(SessionId::new(session));
}

#[when("the allocation for session {session:u64} is probed for health")]
fn probe_health(session_context: &mut SessionContext, session: u64) {
    let name = session_context.allocation_of(session);
    let result = block_on(session_context.controller().health_check(&name));
    session_context.health = Some(ControlOutcome::from_health(result));
}

#[when("the allocation for session {session:u64} is suspended")]
fn suspend(session_context: &mut SessionContext, session: u64) {
    let name = session_context.allocation_of(session);
    let result = block_on(session_context.controller().suspend(&name));
    session_context.control = Some(ControlOutcome::from_mutation(result));
}

#[then("the first apply bound session {session:u64}")]
fn first_apply_bound(session_context: &SessionContext, session: u64) -> Result<(), StepError> {
    match session_context.applies.first() {
        Some(ApplyOutcome::Bound(bound)) if *bound == SessionId::new(session) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected session {session} to bind, got {other:?}"
        ))),
    }
}

#[then("the last apply fails with \"{kind}\"")]
fn last_apply_fails(session_context: &SessionContext, kind: String) -> Result<(), StepError> {
    match session_context.applies.last() {
        Some(ApplyOutcome::Failed { kind: actual, .. }) if *actual == kind.trim() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {kind} from the last apply, got {other:?}"
        ))),
    }
}

#[then("looking up session {session:u64} fails with \"{kind}\"")]
fn lookup_fails(
    session_context: &SessionContext,
    session: u64,
    kind: String,
) -> Result<(), StepError> {
    let outcome = ApplyOutcome::from(
        session_context
            .coordinator()
            .get(SessionId::new(session))
            .map(|view| view.session),
    );
    match outcome {
        ApplyOutcome::Failed { kind: actual, .. } if actual == kind.trim() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {kind} for session {session}, got {other:?}"
        ))),
    }
}

#[then("session {session:u64} is still active")]
fn still_active(session_context: &SessionContext, session: u64) -> Result<(), StepError> {
    let active = session_context.coordinator().active_sessions();
    if active == vec![SessionId::new(session)] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected only session {session} to be active, got {active:?}"
        )))
    }
}

#[then("the vendor was consulted {count:usize} times")]
fn vendor_consulted(session_context: &SessionContext, count: usize) -> Result<(), StepError> {
    let calls = session_context.verifier.calls();
    if calls == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} vendor calls, got {calls}"
        )))
    }
}

#[then("the allocation reported healthy")]
fn reported_healthy(session_context: &SessionContext) -> Result<(), StepError> {
    match session_context.health.as_ref() {
        Some(ControlOutcome::Healthy(true)) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a healthy allocation, got {other:?}"
        ))),
    }
}

#[then("the control call fails with \"{kind}\"")]
fn control_call_fails(session_context: &SessionContext, kind: String) -> Result<(), StepError> {
    match session_context.control.as_ref() {
        Some(ControlOutcome::Failed { kind: actual, .. }) if *actual == kind.trim() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {kind} from the control call, got {other:?}"
        ))),
    }
}

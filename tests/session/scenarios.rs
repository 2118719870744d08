//! BDD scenarios for the session lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{SessionContext, session_context};

#[scenario(
    path = "tests/features/session.feature",
    name = "Apply, probe, and withdraw a session"
)]
fn scenario_apply_probe_withdraw(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Reject a second apply on an active session"
)]
fn scenario_reject_second_apply(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Vendor rejection leaves no session behind"
)]
fn scenario_vendor_rejection(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "GCS credentials are refused as unsupported"
)]
fn scenario_gcs_unsupported(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Build mismatch blocks suspend but not health"
)]
fn scenario_build_mismatch(session_context: SessionContext) {
    let _ = session_context;
}

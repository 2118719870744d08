//! Unit tests for the content lifecycle coordinator.

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::credentials::CredentialsExternal;
use crate::failure::FailureClass;
use crate::provider::Provider;
use crate::registry::{AllocationContext, WorkspaceUnitKey};
use crate::test_support::ScriptedVerifier;
use crate::vendor::{VendorError, VendorFuture};

/// Verifier that parks every call at a shared barrier before accepting.
#[derive(Debug)]
struct GatedVerifier {
    barrier: tokio::sync::Barrier,
}

impl VendorVerifier for GatedVerifier {
    fn verify<'a>(&'a self, _credentials: &'a CredentialsExternal) -> VendorFuture<'a, Verdict> {
        Box::pin(async move {
            self.barrier.wait().await;
            Ok(Verdict::Valid)
        })
    }
}

fn s3_payload() -> Value {
    json!({"accessKey": "AK", "secret": "SK", "region": "us-east-1"})
}

fn s3_request(session: u64) -> ApplyRequest {
    ApplyRequest::new(SessionId::new(session), Provider::S3, Some(s3_payload()))
        .context(AllocationContext::new("http://127.0.0.1:7000"))
}

fn coordinator_with(verifier: ScriptedVerifier) -> Coordinator<ScriptedVerifier> {
    Coordinator::new(
        verifier,
        AllocationRegistry::new(),
        Arc::new(UsageWatcher::new()),
    )
}

#[fixture]
fn coordinator() -> Coordinator<ScriptedVerifier> {
    coordinator_with(ScriptedVerifier::accepting())
}

async fn active(coordinator: &Coordinator<ScriptedVerifier>, session: u64) -> SessionId {
    coordinator
        .apply(s3_request(session))
        .await
        .expect("apply succeeds")
}

#[tokio::test]
async fn apply_binds_credentials_and_allocation() {
    let coordinator = coordinator();

    let session = active(&coordinator, 7).await;
    let view = coordinator.get(session).expect("session active");

    assert_eq!(session, SessionId::new(7));
    assert_eq!(view.provider, Provider::S3);
    assert_eq!(view.bucket, crate::bucket::bucket_name("session-7"));
    assert!(view.objects.is_empty());

    let allocation = coordinator
        .registry()
        .find_by_workspace(&WorkspaceUnitKey::from("session-7"))
        .expect("allocation created");
    assert_eq!(view.allocation, allocation.name);
    assert_eq!(
        coordinator.credentials(session).expect("bound").bucket(),
        view.bucket
    );
}

#[tokio::test]
async fn second_apply_conflicts_and_keeps_first_binding() {
    let verifier = ScriptedVerifier::accepting();
    let coordinator = coordinator_with(verifier.clone());
    let session = active(&coordinator, 7).await;
    let before = coordinator.credentials(session).expect("bound");

    let other_secrets = ApplyRequest::new(
        session,
        Provider::S3,
        Some(json!({"accessKey": "AK2", "secret": "SK2", "region": "eu-west-1"})),
    );
    let err = coordinator
        .apply(other_secrets)
        .await
        .expect_err("session already active");

    assert_eq!(err, SessionError::SessionConflict { session });
    assert_eq!(err.class(), FailureClass::ClientError);
    assert_eq!(coordinator.credentials(session).expect("bound"), before);
    assert_eq!(verifier.calls(), 1, "conflict is detected before verification");
}

#[tokio::test]
async fn rejected_credentials_leave_session_inactive() {
    let coordinator = coordinator_with(ScriptedVerifier::rejecting("InvalidAccessKeyId"));

    let err = coordinator
        .apply(s3_request(3))
        .await
        .expect_err("vendor rejects");

    assert_eq!(
        err,
        SessionError::CredentialsInvalid {
            session: SessionId::new(3),
            reason: String::from("InvalidAccessKeyId"),
        }
    );
    assert_eq!(err.class(), FailureClass::Unauthorized);
    assert!(coordinator.active_sessions().is_empty());
    assert!(coordinator.registry().list().is_empty());
}

#[tokio::test]
async fn unreachable_vendor_is_a_server_error() {
    let coordinator = coordinator_with(ScriptedVerifier::unreachable("https://s3.example"));

    let err = coordinator
        .apply(s3_request(3))
        .await
        .expect_err("vendor unreachable");

    assert!(matches!(
        err,
        SessionError::VendorUnavailable {
            source: VendorError::Unreachable { .. },
            ..
        }
    ));
    assert_eq!(err.class(), FailureClass::ServerError);
    assert!(coordinator.active_sessions().is_empty());
}

#[tokio::test]
async fn unsupported_provider_skips_verification() {
    let verifier = ScriptedVerifier::accepting();
    let coordinator = coordinator_with(verifier.clone());

    let err = coordinator
        .apply(ApplyRequest::new(
            SessionId::new(1),
            Provider::Gcs,
            Some(json!({"key": "x"})),
        ))
        .await
        .expect_err("gcs unsupported");

    assert_eq!(
        err,
        SessionError::UnsupportedProvider {
            provider: Provider::Gcs
        }
    );
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn missing_payload_is_malformed() {
    let coordinator = coordinator();

    let err = coordinator
        .apply(ApplyRequest::new(SessionId::new(1), Provider::S3, None))
        .await
        .expect_err("no payload");

    assert!(matches!(err, SessionError::MalformedCredentials(_)));
    assert_eq!(err.class(), FailureClass::ClientError);
}

#[tokio::test]
async fn sessions_sharing_a_workspace_share_an_allocation() {
    let coordinator = coordinator();
    let first = coordinator
        .apply(s3_request(1).workspace("team"))
        .await
        .expect("first");
    let second = coordinator
        .apply(s3_request(2).workspace("team"))
        .await
        .expect("second");

    let first_view = coordinator.get(first).expect("first active");
    let second_view = coordinator.get(second).expect("second active");
    assert_eq!(first_view.allocation, second_view.allocation);
    assert_ne!(first_view.bucket, second_view.bucket);
}

#[tokio::test]
async fn withdraw_is_a_no_op_when_inactive() {
    let coordinator = coordinator();
    let session = active(&coordinator, 7).await;

    coordinator.withdraw(session);
    coordinator.withdraw(session);

    assert_eq!(
        coordinator.get(session).expect_err("withdrawn"),
        SessionError::SessionNotFound { session }
    );
    coordinator.apply(s3_request(7)).await.expect("re-apply after withdraw");
}

#[tokio::test]
async fn partial_clean_keeps_session_active() {
    let coordinator = coordinator();
    let session = active(&coordinator, 7).await;
    for (key, size) in [("logs/a", 1), ("logs/b", 2), ("data/c", 3)] {
        coordinator
            .record_upload(session, key, size)
            .expect("session active");
    }

    let outcome = coordinator
        .clean(session, &Selector::Prefix(String::from("logs/")))
        .expect("session active");
    assert_eq!(outcome.removed, vec!["logs/a", "logs/b"]);
    assert!(!outcome.session_closed);

    let outcome = coordinator
        .clean(session, &Selector::keys(["data/c", "missing"]))
        .expect("still active");
    assert_eq!(outcome.removed, vec!["data/c"]);
    assert!(coordinator.get(session).expect("active").objects.is_empty());
}

#[tokio::test]
async fn clean_all_closes_the_session() {
    let coordinator = coordinator();
    let session = active(&coordinator, 7).await;
    coordinator
        .record_upload(session, "k", 10)
        .expect("session active");

    let outcome = coordinator.clean(session, &Selector::All).expect("active");

    assert_eq!(
        outcome,
        CleanOutcome {
            removed: vec![String::from("k")],
            session_closed: true,
        }
    );
    assert_eq!(
        coordinator.clean(session, &Selector::All),
        Err(SessionError::SessionNotFound { session })
    );
}

#[tokio::test]
async fn uploads_feed_the_usage_watcher() {
    let usage = Arc::new(UsageWatcher::new());
    let coordinator = Coordinator::new(
        ScriptedVerifier::accepting(),
        AllocationRegistry::new(),
        Arc::clone(&usage),
    );
    let session = active(&coordinator, 7).await;

    coordinator.record_upload(session, "a", 100).expect("active");
    coordinator.record_upload(session, "b", 300).expect("active");

    assert_eq!(usage.files_uploaded(), 2);
    assert_eq!(usage.bytes_uploaded(), 400);
    assert_eq!(
        coordinator.record_upload(SessionId::new(99), "a", 1),
        Err(SessionError::SessionNotFound {
            session: SessionId::new(99)
        })
    );
    assert_eq!(usage.files_uploaded(), 2);
}

#[tokio::test]
async fn snapshot_lists_sessions_without_secrets() {
    let coordinator = coordinator();
    active(&coordinator, 9).await;
    active(&coordinator, 2).await;

    let snapshot = coordinator.snapshot();
    let ids: Vec<_> = snapshot.sessions.iter().map(|view| view.session).collect();
    assert_eq!(ids, vec![SessionId::new(2), SessionId::new(9)]);
    assert_eq!(coordinator.active_sessions(), ids);

    let rendered = serde_json::to_string(&snapshot).expect("serialisable");
    assert!(!rendered.contains("SK"));
    assert!(!rendered.contains("AK"));
}

#[tokio::test]
async fn concurrent_applies_on_distinct_sessions_all_land() {
    let coordinator = Arc::new(coordinator());
    let handles: Vec<_> = (0..16_u64)
        .map(|id| {
            let shared = Arc::clone(&coordinator);
            tokio::spawn(async move { shared.apply(s3_request(id)).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task").expect("apply");
    }

    assert_eq!(coordinator.active_sessions().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_applies_leave_only_the_winning_allocation() {
    let coordinator = Arc::new(Coordinator::new(
        GatedVerifier {
            barrier: tokio::sync::Barrier::new(2),
        },
        AllocationRegistry::new(),
        Arc::new(UsageWatcher::new()),
    ));
    let handles: Vec<_> = ["ws-a", "ws-b"]
        .into_iter()
        .map(|workspace| {
            let shared = Arc::clone(&coordinator);
            tokio::spawn(async move { shared.apply(s3_request(7).workspace(workspace)).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task"));
    }

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.contains(&Err(SessionError::SessionConflict {
        session: SessionId::new(7)
    })));
    let allocations = coordinator.registry().list();
    assert_eq!(allocations.len(), 1);
    let view = coordinator.get(SessionId::new(7)).expect("winner bound");
    assert_eq!(
        allocations.first().map(|allocation| allocation.name.as_str()),
        Some(view.allocation.as_str())
    );
}

#[rstest]
#[case(Selector::All, "anything", true)]
#[case(Selector::Prefix(String::from("a/")), "a/b", true)]
#[case(Selector::Prefix(String::from("a/")), "b/a", false)]
#[case(Selector::keys(["x"]), "x", true)]
#[case(Selector::keys(["x"]), "xy", false)]
fn selector_matching(#[case] selector: Selector, #[case] key: &str, #[case] expected: bool) {
    assert_eq!(selector.matches(key), expected);
}

#[rstest]
fn only_all_covers_the_session() {
    assert!(Selector::All.covers_session());
    assert!(!Selector::Prefix(String::new()).covers_session());
    assert!(!Selector::keys(Vec::<String>::new()).covers_session());
}

//! Integration tests for the call orchestrator.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use conference_controller::errors::ConfError;
use conference_controller::models::InitiateCallRequest;
use conference_controller::services::{CallService, MockEventPublisher, MockMediaBridge};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

struct TestRig {
    service: CallService,
    events: Arc<MockEventPublisher>,
}

fn rig(pool: &PgPool) -> TestRig {
    let bridge = Arc::new(MockMediaBridge::healthy());
    let events = Arc::new(MockEventPublisher::accepting());
    let service = CallService::new(pool.clone(), bridge, events.clone());
    TestRig { service, events }
}

fn initiate(caller: Uuid, callee: Uuid) -> InitiateCallRequest {
    InitiateCallRequest {
        caller_id: caller,
        callee_id: callee,
        chat_id: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_initiate_publishes_initiated_event(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    assert_eq!(call.status, "initiated");
    assert_eq!(call.caller_id, alice);
    assert_eq!(call.callee_id, bob);

    // The initiated event is how the callee's client learns of the call.
    assert_eq!(rig.events.kinds(), vec!["call.initiated"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_call_exclusivity(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    rig.service.initiate(&initiate(alice, bob)).await.unwrap();

    // Alice has an initiated call: she cannot be the callee of another.
    let result = rig.service.initiate(&initiate(carol, alice)).await;
    assert!(matches!(result, Err(ConfError::Conflict(_))));

    // Nor the caller of one.
    let result = rig.service.initiate(&initiate(alice, carol)).await;
    assert!(matches!(result, Err(ConfError::Conflict(_))));

    // Bob is the callee and equally busy.
    let result = rig.service.initiate(&initiate(bob, carol)).await;
    assert!(matches!(result, Err(ConfError::Conflict(_))));

    // Two uninvolved users are free to call each other.
    let dave = Uuid::new_v4();
    rig.service.initiate(&initiate(carol, dave)).await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_self_call_rejected(pool: PgPool) {
    let rig = rig(&pool);
    let alice = Uuid::new_v4();
    let result = rig.service.initiate(&initiate(alice, alice)).await;
    assert!(matches!(result, Err(ConfError::BadRequest(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_only_callee_may_answer(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();

    let result = rig.service.answer(call.call_id, alice).await;
    assert!(matches!(result, Err(ConfError::PermissionDenied(_))));

    let answered = rig.service.answer(call.call_id, bob).await.unwrap();
    assert_eq!(answered.status, "answered");
    assert!(answered.answered_at.is_some());
    assert!(rig.events.kinds().contains(&"call.answered"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_answered_call_cannot_be_answered_again(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    rig.service.answer(call.call_id, bob).await.unwrap();

    let result = rig.service.answer(call.call_id, bob).await;
    assert!(matches!(result, Err(ConfError::InvalidState(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_callee_hangup_before_answer_is_rejected(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    let ended = rig.service.hangup(call.call_id, bob).await.unwrap();

    assert_eq!(ended.status, "ended");
    assert_eq!(ended.end_reason.as_deref(), Some("rejected"));
    assert_eq!(ended.duration_seconds, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_caller_hangup_before_answer_is_cancelled(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    let ended = rig.service.hangup(call.call_id, alice).await.unwrap();

    assert_eq!(ended.end_reason.as_deref(), Some("cancelled"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_answered_hangup_is_user_hangup(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    rig.service.answer(call.call_id, bob).await.unwrap();
    let ended = rig.service.hangup(call.call_id, alice).await.unwrap();

    assert_eq!(ended.end_reason.as_deref(), Some("user_hangup"));
    assert!(ended.duration_seconds >= 0);
    assert!(rig.events.kinds().contains(&"call.ended"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_stranger_cannot_hang_up(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    let result = rig.service.hangup(call.call_id, Uuid::new_v4()).await;
    assert!(matches!(result, Err(ConfError::PermissionDenied(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_double_hangup_is_invalid_state(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    rig.service.hangup(call.call_id, alice).await.unwrap();

    let result = rig.service.hangup(call.call_id, bob).await;
    assert!(matches!(result, Err(ConfError::InvalidState(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ended_call_frees_parties(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let call = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    rig.service.hangup(call.call_id, alice).await.unwrap();

    // With the first call ended, both parties can call again.
    rig.service.initiate(&initiate(bob, alice)).await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_history_is_newest_first(pool: PgPool) {
    let rig = rig(&pool);
    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let first = rig.service.initiate(&initiate(alice, bob)).await.unwrap();
    rig.service.hangup(first.call_id, alice).await.unwrap();

    let second = rig.service.initiate(&initiate(carol, alice)).await.unwrap();
    rig.service.hangup(second.call_id, alice).await.unwrap();

    let history = rig.service.history(alice, 0).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].call_id, second.call_id);
    assert_eq!(history[1].call_id, first.call_id);

    // Bob only ever saw the first call.
    let history = rig.service.history(bob, 0).await.unwrap();
    assert_eq!(history.len(), 1);
}

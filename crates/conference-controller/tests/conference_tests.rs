//! Integration tests for the conference orchestrator.
//!
//! Exercise the real repositories against a migrated database, with the
//! bridge/event/chat collaborators replaced by recording mocks.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use conference_controller::errors::ConfError;
use conference_controller::models::{
    CreateConferenceRequest, JoinConferenceRequest, KickParticipantRequest,
    MuteParticipantRequest, UpdateRoleRequest,
};
use conference_controller::services::{
    ConferenceService, MockChatClient, MockEventPublisher, MockMediaBridge,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

struct TestRig {
    service: ConferenceService,
    bridge: Arc<MockMediaBridge>,
    events: Arc<MockEventPublisher>,
    chat: Arc<MockChatClient>,
}

fn rig(pool: &PgPool) -> TestRig {
    let bridge = Arc::new(MockMediaBridge::healthy());
    let events = Arc::new(MockEventPublisher::accepting());
    let chat = Arc::new(MockChatClient::accepting());
    let service = ConferenceService::new(
        pool.clone(),
        bridge.clone(),
        events.clone(),
        chat.clone(),
    );
    TestRig {
        service,
        bridge,
        events,
        chat,
    }
}

fn degraded_rig(pool: &PgPool) -> TestRig {
    let bridge = Arc::new(MockMediaBridge::unreachable());
    let events = Arc::new(MockEventPublisher::failing());
    let chat = Arc::new(MockChatClient::accepting());
    let service = ConferenceService::new(
        pool.clone(),
        bridge.clone(),
        events.clone(),
        chat.clone(),
    );
    TestRig {
        service,
        bridge,
        events,
        chat,
    }
}

fn create_request(creator: Uuid, max_members: Option<i32>) -> CreateConferenceRequest {
    CreateConferenceRequest {
        name: "Standup".to_string(),
        chat_id: Some(Uuid::new_v4()),
        creator_id: creator,
        max_members,
        is_private: false,
        recording: false,
    }
}

fn join_request(user: Uuid) -> JoinConferenceRequest {
    JoinConferenceRequest {
        user_id: user,
        muted: false,
        display_name: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_adds_creator_as_originator(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();

    assert_eq!(conference.status, "active");
    assert_eq!(conference.event_type, "adhoc");
    assert_eq!(conference.max_members, 10);
    assert!(conference.room_name.starts_with("conf_"));
    assert!(conference.started_at.is_some());

    let participants = rig
        .service
        .list_participants(conference.conference_id)
        .await
        .unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].user_id, creator);
    assert_eq!(participants[0].role, "originator");
    assert_eq!(participants[0].status, "joined");

    assert!(rig.events.kinds().contains(&"created"));
    // Room pre-created on the bridge, notice posted to the chat.
    assert!(!rig.bridge.calls().is_empty());
    assert_eq!(rig.chat.notices().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_private_conference_gets_unguessable_room(pool: PgPool) {
    let rig = rig(&pool);
    let mut request = create_request(Uuid::new_v4(), None);
    request.is_private = true;

    let conference = rig.service.create(&request).await.unwrap();
    assert!(conference.room_name.starts_with("private_"));
    assert!(conference.is_private);

    // Private conferences are not listed.
    let listed = rig.service.list_active(None).await.unwrap();
    assert!(listed.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_join_is_idempotent(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let user = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();

    let first = rig
        .service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();
    let second = rig
        .service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();

    // Same row both times, exactly one active row for the pair.
    assert_eq!(first.participant_id, second.participant_id);
    let participants = rig
        .service
        .list_participants(conference.conference_id)
        .await
        .unwrap();
    assert_eq!(participants.len(), 2); // creator + user

    // Exactly one joined event for the user: no duplicate side effects.
    let joined_events = rig
        .events
        .kinds()
        .iter()
        .filter(|k| **k == "participant.joined")
        .count();
    assert_eq!(joined_events, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_capacity_exceeded(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();

    let conference = rig
        .service
        .create(&create_request(creator, Some(2)))
        .await
        .unwrap();

    // Creator occupies one slot; one more fits.
    rig.service
        .join(conference.conference_id, &join_request(Uuid::new_v4()))
        .await
        .unwrap();

    let result = rig
        .service
        .join(conference.conference_id, &join_request(Uuid::new_v4()))
        .await;
    assert!(matches!(result, Err(ConfError::CapacityExceeded(_))));

    // The rejected join created no row.
    let participants = rig
        .service
        .list_participants(conference.conference_id)
        .await
        .unwrap();
    assert_eq!(participants.len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_auto_end_when_last_participant_leaves(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    rig.service
        .leave(conference.conference_id, creator)
        .await
        .unwrap();

    let ended = rig.service.get(conference.conference_id).await.unwrap();
    assert_eq!(ended.conference.status, "ended");
    let ended_at = ended.conference.ended_at.expect("ended_at must be set");
    let started_at = ended.conference.started_at.expect("started_at was set at create");
    assert!((ended_at - started_at).num_seconds() >= 0);

    assert!(rig.events.kinds().contains(&"participant.left"));
    assert!(rig.events.kinds().contains(&"ended"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_leave_with_remaining_participants_keeps_conference_active(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let (user1, user2, user3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    for user in [user1, user2, user3] {
        rig.service
            .join(conference.conference_id, &join_request(user))
            .await
            .unwrap();
    }

    // Creator mutes user2; users 1 and 3 are unaffected.
    rig.service
        .mute(
            conference.conference_id,
            &MuteParticipantRequest {
                actor_id: creator,
                target_user_id: user2,
                muted: true,
            },
        )
        .await
        .unwrap();

    let participants = rig
        .service
        .list_participants(conference.conference_id)
        .await
        .unwrap();
    for participant in &participants {
        assert_eq!(
            participant.is_muted,
            participant.user_id == user2,
            "only user2 is muted"
        );
    }

    // Creator leaves; active participants remain, so no auto-end.
    rig.service
        .leave(conference.conference_id, creator)
        .await
        .unwrap();
    let current = rig.service.get(conference.conference_id).await.unwrap();
    assert_eq!(current.conference.status, "active");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_self_mute_needs_no_privileges(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let user = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    rig.service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();

    let updated = rig
        .service
        .mute(
            conference.conference_id,
            &MuteParticipantRequest {
                actor_id: user,
                target_user_id: user,
                muted: true,
            },
        )
        .await
        .unwrap();
    assert!(updated.is_muted);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_participant_cannot_mute_others(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let (user1, user2) = (Uuid::new_v4(), Uuid::new_v4());

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    for user in [user1, user2] {
        rig.service
            .join(conference.conference_id, &join_request(user))
            .await
            .unwrap();
    }

    let result = rig
        .service
        .mute(
            conference.conference_id,
            &MuteParticipantRequest {
                actor_id: user1,
                target_user_id: user2,
                muted: true,
            },
        )
        .await;
    assert!(matches!(result, Err(ConfError::PermissionDenied(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_moderator_kick_rights(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let (moderator, regular) = (Uuid::new_v4(), Uuid::new_v4());

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    for user in [moderator, regular] {
        rig.service
            .join(conference.conference_id, &join_request(user))
            .await
            .unwrap();
    }
    rig.service
        .update_role(
            conference.conference_id,
            &UpdateRoleRequest {
                actor_id: creator,
                target_user_id: moderator,
                role: "moderator".to_string(),
            },
        )
        .await
        .unwrap();

    // Moderator cannot kick the originator.
    let result = rig
        .service
        .kick(
            conference.conference_id,
            &KickParticipantRequest {
                actor_id: moderator,
                target_user_id: creator,
            },
        )
        .await;
    assert!(matches!(result, Err(ConfError::PermissionDenied(_))));

    // Moderator kicks a regular participant.
    rig.service
        .kick(
            conference.conference_id,
            &KickParticipantRequest {
                actor_id: moderator,
                target_user_id: regular,
            },
        )
        .await
        .unwrap();

    let participants = rig
        .service
        .list_participants(conference.conference_id)
        .await
        .unwrap();
    assert!(participants.iter().all(|p| p.user_id != regular));

    // Kick is audited.
    let actions = rig
        .service
        .list_moderator_actions(conference.conference_id, 0, 50)
        .await
        .unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action, "kick");
    assert_eq!(actions[0].actor_user_id, moderator);
    assert_eq!(actions[0].target_user_id, regular);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kicked_user_may_rejoin(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let user = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    let first = rig
        .service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();

    rig.service
        .kick(
            conference.conference_id,
            &KickParticipantRequest {
                actor_id: creator,
                target_user_id: user,
            },
        )
        .await
        .unwrap();

    // Kick ejects from the session; it is not a ban. A new row is created.
    let second = rig
        .service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();
    assert_ne!(first.participant_id, second.participant_id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_end_requires_creator(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();
    let user = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    rig.service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();

    let result = rig.service.end(conference.conference_id, user).await;
    assert!(matches!(result, Err(ConfError::PermissionDenied(_))));

    rig.service.end(conference.conference_id, creator).await.unwrap();

    let ended = rig.service.get(conference.conference_id).await.unwrap();
    assert_eq!(ended.conference.status, "ended");
    // Every active row was released in the same transition.
    assert!(rig
        .service
        .list_participants(conference.conference_id)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_bridge_and_bus_failures_never_block_orchestration(pool: PgPool) {
    let rig = degraded_rig(&pool);
    let creator = Uuid::new_v4();
    let user = Uuid::new_v4();

    // Bridge unreachable, event bus failing: store mutations still land.
    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    rig.service
        .join(conference.conference_id, &join_request(user))
        .await
        .unwrap();
    rig.service
        .leave(conference.conference_id, user)
        .await
        .unwrap();
    rig.service.end(conference.conference_id, creator).await.unwrap();

    let ended = rig.service.get(conference.conference_id).await.unwrap();
    assert_eq!(ended.conference.status, "ended");

    // The side channels were attempted despite failing.
    assert!(!rig.bridge.calls().is_empty());
    assert!(!rig.events.events().is_empty());
    // Chat stayed healthy in this rig and received the notices.
    assert!(!rig.chat.notices().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_uses_live_bridge_count_when_reachable(pool: PgPool) {
    let rig = rig(&pool);
    let creator = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();

    // Bridge reports three live members; the store only knows one.
    rig.bridge.set_members(vec![
        conference_controller::services::BridgeMember {
            handle: "m1".to_string(),
            address: "alice@conclave.local".to_string(),
            muted: false,
            speaking: false,
        },
        conference_controller::services::BridgeMember {
            handle: "m2".to_string(),
            address: "bob@conclave.local".to_string(),
            muted: false,
            speaking: true,
        },
        conference_controller::services::BridgeMember {
            handle: "m3".to_string(),
            address: "carol@conclave.local".to_string(),
            muted: true,
            speaking: false,
        },
    ]);

    let response = rig.service.get(conference.conference_id).await.unwrap();
    assert_eq!(response.participant_count, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_falls_back_to_store_count_when_bridge_down(pool: PgPool) {
    let rig = degraded_rig(&pool);
    let creator = Uuid::new_v4();

    let conference = rig.service.create(&create_request(creator, None)).await.unwrap();
    let response = rig.service.get(conference.conference_id).await.unwrap();
    // Unreachable bridge is not an error; last known count stands.
    assert_eq!(response.participant_count, 1);
}

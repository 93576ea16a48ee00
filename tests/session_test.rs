#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use common::{ann, bob, bound_session, put_item, seeded_store};
use pantry::remote::{RemoteStore, WriteOp, paths};
use pantry::{
    Config, ErrorKind, Identity, LocalIdentity, NoGroupReason, PantryError, Session, SessionEvent, SessionState,
};
use serde_json::json;
use tokio::sync::broadcast;

/// Receive events until one matches, failing after a timeout.
async fn wait_for_state(events: &mut broadcast::Receiver<SessionEvent>, want: impl Fn(&SessionState) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged(state)) if want(&state) => return,
                Ok(_) => {}
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for session state");
}

#[tokio::test]
async fn test_switching_users_rebinds_to_the_new_group() {
    let store = seeded_store();
    put_item(&store, "g1", "i1", "Milk", "Other", false);
    put_item(&store, "g2", "i1", "Firewood", "Other", false);
    let session = bound_session(&store, ann()).await;
    assert_eq!(session.state().items[0].name, "Milk");

    session.handle_identity(Some(bob())).await.unwrap();
    session.flush().await;

    let state = session.state();
    assert_eq!(
        state.session,
        SessionState::Bound {
            uid: "u2".to_string(),
            group_id: "g2".to_string()
        }
    );
    assert_eq!(state.group.unwrap().name, "Cabin");
    assert_eq!(state.members[0].display_name(), "Bob");
    assert_eq!(store.subscriber_count(), 4);

    // Writes to the old group never reach the new binding.
    put_item(&store, "g1", "i2", "Eggs", "Other", false);
    session.flush().await;
    let items: Vec<_> = session.state().items.into_iter().map(|i| i.name).collect();
    assert_eq!(items, vec!["Firewood"]);
}

#[tokio::test]
async fn test_two_sessions_share_a_group() {
    let store = seeded_store();
    store
        .put_document(
            &paths::group("g1"),
            json!({"name": "Home", "createdBy": "u1", "members": ["u1", "u3"]}),
        )
        .unwrap();
    store
        .put_document(
            &paths::user("u3"),
            json!({"email": "cy@example.com", "name": null, "groupId": "g1"}),
        )
        .unwrap();

    let first = bound_session(&store, ann()).await;
    let second = bound_session(&store, Identity::new("u3", None)).await;

    first.add_item("Milk", None).await.unwrap();
    first.flush().await;
    second.flush().await;

    let seen = second.state();
    assert_eq!(seen.items.len(), 1);
    assert_eq!(seen.items[0].added_by_uid, "u1");
    let names: Vec<_> = seen.members.iter().map(|m| m.display_name().to_string()).collect();
    assert_eq!(names, vec!["Ann", "cy@example.com"]);
}

#[tokio::test]
async fn test_member_changes_are_resolved() {
    let store = seeded_store();
    let session = bound_session(&store, ann()).await;
    assert_eq!(session.state().members.len(), 1);

    // u9 has no profile and falls back to its uid.
    store
        .update_document(
            &paths::group("g1"),
            pantry::remote::Fields::new().set("members", vec!["u1", "u9"]),
        )
        .await
        .unwrap();
    session.flush().await;

    let members = session.state().members;
    assert_eq!(members.len(), 2);
    assert_eq!(members[1].uid, "u9");
    assert_eq!(members[1].display_name(), "u9");
}

#[tokio::test]
async fn test_missing_profile_enters_no_group() {
    let store = seeded_store();
    let session = Session::new(store.clone(), Config::default());

    let err = session
        .handle_identity(Some(Identity::new("stranger", None)))
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::UserNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        session.session_state(),
        SessionState::NoGroup {
            uid: "stranger".to_string(),
            reason: NoGroupReason::UserNotFound
        }
    );
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_profile_without_group_or_with_missing_group() {
    let store = seeded_store();
    store
        .put_document(&paths::user("u4"), json!({"email": null, "name": "Dee"}))
        .unwrap();
    store
        .put_document(&paths::user("u5"), json!({"name": "Eve", "groupId": "gone"}))
        .unwrap();
    let session = Session::new(store.clone(), Config::default());

    let err = session
        .handle_identity(Some(Identity::new("u4", None)))
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::MissingGroupId(_)));

    let err = session
        .handle_identity(Some(Identity::new("u5", None)))
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::GroupNotFound(g) if g == "gone"));
    assert!(matches!(
        session.session_state(),
        SessionState::NoGroup {
            reason: NoGroupReason::GroupNotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn test_transient_read_failure_stays_resolving() {
    let store = seeded_store();
    let session = Session::new(store.clone(), Config::default());

    store.fail_next_reads(1);
    let err = session.handle_identity(Some(ann())).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(
        session.session_state(),
        SessionState::ResolvingGroup {
            uid: "u1".to_string()
        }
    );

    // Retrying the same identity resolves normally.
    session.handle_identity(Some(ann())).await.unwrap();
    session.flush().await;
    assert!(session.session_state().is_bound());
}

#[tokio::test]
async fn test_removed_group_unbinds() {
    let store = seeded_store();
    put_item(&store, "g1", "i1", "Milk", "Other", false);
    let session = bound_session(&store, ann()).await;

    store
        .run_batch(vec![WriteOp::Delete {
            path: paths::group("g1"),
        }])
        .await
        .unwrap();
    session.flush().await;

    assert_eq!(
        session.session_state(),
        SessionState::NoGroup {
            uid: "u1".to_string(),
            reason: NoGroupReason::GroupRemoved
        }
    );
    let state = session.state();
    assert!(state.items.is_empty());
    assert!(state.group.is_none());
    assert_eq!(store.subscriber_count(), 0);
    assert!(matches!(
        session.add_item("Eggs", None).await,
        Err(PantryError::NotBound)
    ));
}

#[tokio::test]
async fn test_watch_identity_follows_sign_in_and_out() {
    let store = seeded_store();
    let session = Session::new(store.clone(), Config::default());
    let provider = LocalIdentity::new();
    let mut events = session.subscribe();

    session.watch_identity(&provider);
    provider.sign_in(ann());
    wait_for_state(&mut events, SessionState::is_bound).await;
    session.flush().await;
    assert_eq!(session.state().group.unwrap().name, "Home");

    provider.sign_out();
    wait_for_state(&mut events, |s| *s == SessionState::Unauthenticated).await;
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_dropping_the_session_releases_subscriptions() {
    let store = seeded_store();
    let session = bound_session(&store, ann()).await;
    assert_eq!(store.subscriber_count(), 4);
    drop(session);
    assert_eq!(store.subscriber_count(), 0);
}

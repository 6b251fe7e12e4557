//! Notification dispatcher tests over the in-memory store.

mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use helpers::{new_item, InMemoryItemStore, InMemoryNotificationStore};
use refind_core::{
    Error, ItemKind, ItemMatch, ItemStore, MatchLevel, NewNotification, NotificationKind,
    NotificationStore,
};
use refind_jobs::NotificationDispatcher;

fn sample_match(lost_user: Option<Uuid>, found_user: Option<Uuid>) -> ItemMatch {
    ItemMatch {
        id: Uuid::new_v4(),
        lost_item_id: Uuid::new_v4(),
        found_item_id: Uuid::new_v4(),
        lost_user_id: lost_user,
        found_user_id: found_user,
        confidence_score: 82.5,
        image_similarity: 90.0,
        text_similarity: 70.0,
        category_match: 100.0,
        match_level: MatchLevel::High,
        confirmed: false,
        dismissed: false,
        created_at: Utc::now(),
        confirmed_at: None,
    }
}

async fn item_pair(items: &InMemoryItemStore) -> (refind_core::Item, refind_core::Item) {
    let lost_id = items
        .insert(new_item(ItemKind::Lost, "Lost phone", None))
        .await
        .unwrap();
    let found_id = items
        .insert(new_item(ItemKind::Found, "Found phone", None))
        .await
        .unwrap();
    (
        items.get(lost_id).await.unwrap(),
        items.get(found_id).await.unwrap(),
    )
}

#[tokio::test]
async fn match_found_skips_sides_without_an_owner() {
    let store = Arc::new(InMemoryNotificationStore::new());
    let items = InMemoryItemStore::new();
    let dispatcher = NotificationDispatcher::new(store.clone());

    let bob = Uuid::new_v4();
    let m = sample_match(None, Some(bob));
    let (lost_item, found_item) = item_pair(&items).await;

    dispatcher
        .notify_match_found(&m, &lost_item, &found_item)
        .await
        .unwrap();

    let inbox = store.list_for_user(bob).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::MatchFound);
    assert_eq!(inbox[0].match_id, Some(m.id));
    assert!(inbox[0].message.contains("Lost phone"));
}

#[tokio::test]
async fn confirmation_goes_to_the_other_party_only() {
    let store = Arc::new(InMemoryNotificationStore::new());
    let dispatcher = NotificationDispatcher::new(store.clone());

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let m = sample_match(Some(alice), Some(bob));

    dispatcher.notify_match_confirmed(&m, alice).await.unwrap();

    assert_eq!(store.count_unread(alice).await.unwrap(), 0);
    let bob_inbox = store.list_for_user(bob).await.unwrap();
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(bob_inbox[0].kind, NotificationKind::MatchConfirmed);
}

#[tokio::test]
async fn read_state_operations_enforce_ownership() {
    let store = Arc::new(InMemoryNotificationStore::new());
    let dispatcher = NotificationDispatcher::new(store.clone());

    let alice = Uuid::new_v4();
    let mallory = Uuid::new_v4();
    let id = store
        .insert(NewNotification {
            user_id: alice,
            title: "Potential Match Found!".to_string(),
            message: "A candidate match was found.".to_string(),
            kind: NotificationKind::MatchFound,
            match_id: None,
            item_id: None,
        })
        .await
        .unwrap();

    let err = dispatcher.mark_as_read(id, mallory).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized(_)));
    assert!(matches!(
        dispatcher.delete(id, mallory).await.unwrap_err(),
        Error::NotAuthorized(_)
    ));

    dispatcher.mark_as_read(id, alice).await.unwrap();
    let n = store.get(id).await.unwrap();
    assert!(n.read);
    assert!(n.read_at.is_some());

    dispatcher.delete(id, alice).await.unwrap();
    assert!(store.get(id).await.is_err());
}

#[tokio::test]
async fn mark_all_read_reports_updated_count() {
    let store = Arc::new(InMemoryNotificationStore::new());
    let dispatcher = NotificationDispatcher::new(store.clone());

    let alice = Uuid::new_v4();
    for i in 0..3 {
        store
            .insert(NewNotification {
                user_id: alice,
                title: format!("Notification {i}"),
                message: "hello".to_string(),
                kind: NotificationKind::ItemComment,
                match_id: None,
                item_id: None,
            })
            .await
            .unwrap();
    }

    assert_eq!(dispatcher.mark_all_read(alice).await.unwrap(), 3);
    assert_eq!(dispatcher.count_unread(alice).await.unwrap(), 0);
    // Second pass has nothing left to update.
    assert_eq!(dispatcher.mark_all_read(alice).await.unwrap(), 0);
}

#[tokio::test]
async fn retention_sweep_removes_only_old_read_notifications() {
    let store = Arc::new(InMemoryNotificationStore::new());
    let dispatcher = NotificationDispatcher::new(store.clone());

    let alice = Uuid::new_v4();
    let mut ids = Vec::new();
    for i in 0..3 {
        let id = store
            .insert(NewNotification {
                user_id: alice,
                title: format!("Notification {i}"),
                message: "hello".to_string(),
                kind: NotificationKind::MatchFound,
                match_id: None,
                item_id: None,
            })
            .await
            .unwrap();
        ids.push(id);
    }

    let long_ago = Utc::now() - Duration::days(120);
    store.backdate(ids[0], long_ago); // old and will be read: swept
    store.backdate(ids[1], long_ago); // old but unread: kept
    store.mark_read(ids[0]).await.unwrap();
    store.mark_read(ids[2]).await.unwrap(); // read but recent: kept

    assert_eq!(dispatcher.run_retention_sweep().await.unwrap(), 1);
    let remaining = store.list_for_user(alice).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|n| n.id != ids[0]));
}

#[tokio::test]
async fn comment_notification_names_the_commenter() {
    let store = Arc::new(InMemoryNotificationStore::new());
    let items = InMemoryItemStore::new();
    let dispatcher = NotificationDispatcher::new(store.clone());

    let owner = Uuid::new_v4();
    let (lost_item, _) = item_pair(&items).await;

    dispatcher
        .notify_comment(owner, &lost_item, "carol")
        .await
        .unwrap();

    let inbox = store.list_for_user(owner).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "New Comment on Your Item");
    assert!(inbox[0].message.contains("carol"));
    assert_eq!(inbox[0].item_id, Some(lost_item.id));
}

//! Notification templates and per-user notification operations.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use refind_core::{
    defaults, Error, Item, ItemMatch, NewNotification, Notification, NotificationKind,
    NotificationStore, Result,
};

/// Title for the lost-side "we found a candidate" notification.
pub const TITLE_MATCH_FOUND: &str = "Potential Match Found!";

/// Title for the found-side "someone may be looking for this" notification.
pub const TITLE_FOUND_ITEM_MATCHES: &str = "Your Found Item Matches a Lost Report";

/// Title for the confirmation notification sent to the other party.
pub const TITLE_MATCH_CONFIRMED: &str = "Match Confirmed!";

/// Title for comment notifications.
pub const TITLE_ITEM_COMMENT: &str = "New Comment on Your Item";

/// Creates notifications from match events and exposes the per-user
/// read-state operations with ownership checks.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Notify both owners of a newly recorded match. Each side gets a
    /// message phrased for its role; sides without a registered owner are
    /// skipped.
    pub async fn notify_match_found(
        &self,
        m: &ItemMatch,
        lost_item: &Item,
        found_item: &Item,
    ) -> Result<()> {
        if let Some(lost_user) = m.lost_user_id {
            self.store
                .insert(NewNotification {
                    user_id: lost_user,
                    title: TITLE_MATCH_FOUND.to_string(),
                    message: format!(
                        "A found item \"{}\" matches your lost report \"{}\" with {:.1}% confidence.",
                        found_item.title, lost_item.title, m.confidence_score
                    ),
                    kind: NotificationKind::MatchFound,
                    match_id: Some(m.id),
                    item_id: Some(m.lost_item_id),
                })
                .await?;
        }

        if let Some(found_user) = m.found_user_id {
            self.store
                .insert(NewNotification {
                    user_id: found_user,
                    title: TITLE_FOUND_ITEM_MATCHES.to_string(),
                    message: format!(
                        "Your found item \"{}\" may belong to the owner of lost report \"{}\" ({:.1}% confidence).",
                        found_item.title, lost_item.title, m.confidence_score
                    ),
                    kind: NotificationKind::MatchFound,
                    match_id: Some(m.id),
                    item_id: Some(m.found_item_id),
                })
                .await?;
        }

        debug!(
            subsystem = "jobs",
            component = "notify",
            op = "match_found",
            match_id = %m.id,
            "Dispatched match notifications"
        );
        Ok(())
    }

    /// Notify the party opposite the confirming user.
    pub async fn notify_match_confirmed(
        &self,
        m: &ItemMatch,
        confirming_user: Uuid,
    ) -> Result<()> {
        let other = [m.lost_user_id, m.found_user_id]
            .into_iter()
            .flatten()
            .find(|&u| u != confirming_user);

        if let Some(user_id) = other {
            self.store
                .insert(NewNotification {
                    user_id,
                    title: TITLE_MATCH_CONFIRMED.to_string(),
                    message: format!(
                        "The other party confirmed a match with {:.1}% confidence. \
                         Check your matches for next steps.",
                        m.confidence_score
                    ),
                    kind: NotificationKind::MatchConfirmed,
                    match_id: Some(m.id),
                    item_id: None,
                })
                .await?;
        }
        Ok(())
    }

    /// Notify an item's owner about a new comment.
    pub async fn notify_comment(
        &self,
        owner_id: Uuid,
        item: &Item,
        commenter_name: &str,
    ) -> Result<()> {
        self.store
            .insert(NewNotification {
                user_id: owner_id,
                title: TITLE_ITEM_COMMENT.to_string(),
                message: format!(
                    "{} commented on your item \"{}\".",
                    commenter_name, item.title
                ),
                kind: NotificationKind::ItemComment,
                match_id: None,
                item_id: Some(item.id),
            })
            .await?;
        Ok(())
    }

    /// All notifications for a user, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.store.list_for_user(user_id).await
    }

    /// Unread notifications for a user, newest first.
    pub async fn list_unread_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.store.list_unread_for_user(user_id).await
    }

    /// Count of unread notifications for a user.
    pub async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        self.store.count_unread(user_id).await
    }

    /// Mark one notification read. Only the recipient may do this.
    pub async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let notification = self.store.get(id).await?;
        if notification.user_id != user_id {
            return Err(Error::NotAuthorized(
                "notification belongs to another user".to_string(),
            ));
        }
        self.store.mark_read(id).await
    }

    /// Mark all of a user's notifications read.
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.store.mark_all_read(user_id).await
    }

    /// Delete one notification. Only the recipient may do this.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let notification = self.store.get(id).await?;
        if notification.user_id != user_id {
            return Err(Error::NotAuthorized(
                "notification belongs to another user".to_string(),
            ));
        }
        self.store.delete(id).await
    }

    /// Prune read notifications past the retention window.
    pub async fn run_retention_sweep(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(defaults::NOTIFICATION_RETENTION_DAYS);
        let deleted = self.store.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(
                subsystem = "jobs",
                component = "notify",
                op = "retention_sweep",
                deleted,
                "Pruned old notifications"
            );
        }
        Ok(deleted)
    }
}

//! Notification read path and the admin broadcast.
//!
//! Approval notifications are written only by the moderation engine, inside
//! the same store transaction as the status change.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AppError, Identity, NewNotification, Notification, NotificationKind, NotificationRepository,
    Page, PageRequest, Result, UserId,
};
use tracing::{info, warn};

use crate::{require_admin, store_failure};

/// Longest notification body the store accepts.
pub const MAX_NOTIFICATION_LEN: usize = 100;

pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationRepository>) -> Self {
        Self { notifications }
    }

    /// A user may only read their own inbox.
    pub async fn list_for_recipient(
        &self,
        identity: &Identity,
        recipient: UserId,
        page: PageRequest,
    ) -> Result<Page<Notification>> {
        if identity.subject != recipient {
            warn!(user = %identity.subject, recipient = %recipient, "inbox read rejected");
            return Err(AppError::Forbidden(
                "notifications are visible to their recipient only".into(),
            ));
        }

        self.notifications
            .list_for_recipient(recipient, page)
            .await
            .map_err(store_failure("notification.list_for_recipient"))
    }

    /// Admin-only system message addressed to every user.
    pub async fn broadcast(&self, identity: &Identity, content: String) -> Result<Notification> {
        require_admin(identity, "broadcast")?;
        if content.trim().is_empty() || content.chars().count() > MAX_NOTIFICATION_LEN {
            return Err(AppError::Validation(format!(
                "notification content must be 1 to {MAX_NOTIFICATION_LEN} characters"
            )));
        }

        let notification = self
            .notifications
            .insert(NewNotification {
                content,
                kind: NotificationKind::System,
                recipient_id: None,
                post_id: None,
                created_at: Utc::now(),
            })
            .await
            .map_err(store_failure("notification.insert"))?;

        info!(notification_id = %notification.id, admin = %identity.subject, "broadcast sent");
        Ok(notification)
    }
}

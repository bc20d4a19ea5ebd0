//! # Ports
//!
//! Every adapter must implement these traits to be wired into the binary.
//! Multi-row writes (`apply_edit`, `apply_decision`, `delete`) are single
//! store operations so that each adapter can run them inside one transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::errors::{Result, StoreResult};
use crate::models::{
    ContentEdit, Identity, Inspire, ModerationDecision, ModerationOutcome, NewNotification,
    NewPost, Notification, NotificationId, Post, PostId, PostStatus, Profile, UserId,
};
use crate::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// Filter for post listings. Unset fields do not constrain the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub status: Option<PostStatus>,
    pub author_id: Option<UserId>,
    pub exclude_author_id: Option<UserId>,
    pub order: SortOrder,
}

impl PostQuery {
    pub fn matches(&self, post: &Post) -> bool {
        self.status.map_or(true, |s| post.status == s)
            && self.author_id.map_or(true, |a| post.author_id == a)
            && self.exclude_author_id.map_or(true, |a| post.author_id != a)
    }
}

/// Persistence contract for posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: NewPost) -> StoreResult<Post>;

    async fn find_by_id(&self, id: PostId) -> StoreResult<Option<Post>>;

    /// Replaces the content of a post owned by `edit.author_id`, resets it to
    /// `Pending`, clears the moderator and deletes its notification, atomically.
    /// Returns `None` when no post with that id belongs to that author.
    async fn apply_edit(&self, edit: ContentEdit) -> StoreResult<Option<Post>>;

    /// Sets status and moderator. When `approval_notice` is present and the
    /// post has no notification yet, inserts and attaches it in the same
    /// transaction. Returns `None` when the post does not exist.
    async fn apply_decision(
        &self,
        decision: ModerationDecision,
    ) -> StoreResult<Option<ModerationOutcome>>;

    /// Deletes a post owned by `author_id` together with its inspires and
    /// notification. Returns `false` when nothing matched.
    async fn delete(&self, id: PostId, author_id: UserId) -> StoreResult<bool>;

    async fn list(&self, query: PostQuery, page: PageRequest) -> StoreResult<Page<Post>>;
}

/// Persistence contract for the like relation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait InspireRepository: Send + Sync {
    /// Inserts the (post, user) pair. Must fail with
    /// [`StoreError::UniqueViolation`](crate::StoreError::UniqueViolation) when
    /// the pair already exists, and with
    /// [`StoreError::NotEligible`](crate::StoreError::NotEligible) when the post
    /// is not `Approved` at the moment of the write. Both are decided
    /// atomically with the insert.
    async fn insert(
        &self,
        post_id: PostId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Inspire>;

    /// Returns `false` when the pair did not exist.
    async fn delete(&self, post_id: PostId, user_id: UserId) -> StoreResult<bool>;

    /// Like counts for the given posts. Posts without likes may be omitted.
    async fn count_by_posts(&self, post_ids: &[PostId]) -> StoreResult<HashMap<PostId, u64>>;

    /// The subset of `post_ids` that `user_id` has liked.
    async fn liked_among(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> StoreResult<HashSet<PostId>>;
}

/// Persistence contract for notifications.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: NewNotification) -> StoreResult<Notification>;

    async fn find_by_id(&self, id: NotificationId) -> StoreResult<Option<Notification>>;

    /// Notifications addressed to `user_id` plus broadcasts, newest first.
    async fn list_for_recipient(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Page<Notification>>;
}

/// Verifies bearer credentials.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Fails with [`AppError::Unauthenticated`](crate::AppError::Unauthenticated).
    fn verify(&self, credential: &str) -> Result<Identity>;
}

/// Read access to the external user profile store.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn display_names(&self, ids: &[UserId]) -> StoreResult<HashMap<UserId, String>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Profile>>;
}

/// Best-effort avatar lookup. Absence is `Ok(None)`, never an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn avatar(&self, user_id: UserId) -> anyhow::Result<Option<Bytes>>;
}

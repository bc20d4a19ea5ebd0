//! # Domain Models
//!
//! These structs represent the core entities of the feed: posts, inspires
//! (likes) and notifications, plus the authenticated identity that every
//! operation is performed on behalf of.
//!
//! Posts, inspires and notifications carry store-assigned, monotonically
//! increasing integer ids so that "newest first" is simply "id descending".
//! Users come from the external identity provider and are keyed by UUID.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

surrogate_id!(
    /// Store-assigned post identifier.
    PostId
);
surrogate_id!(InspireId);
surrogate_id!(NotificationId);

/// Identifier of a user as issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Closed set of roles. Authorization checks match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

/// The authenticated subject extracted from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: UserId,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => false,
        }
    }
}

// ─── Post ────────────────────────────────────────────────────────────────────

/// Moderation status of a post. A post is in exactly one of these at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Pending,
    Approved,
    Declined,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "PENDING",
            PostStatus::Approved => "APPROVED",
            PostStatus::Declined => "DECLINED",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PostStatus::Pending),
            "APPROVED" => Ok(PostStatus::Approved),
            "DECLINED" => Ok(PostStatus::Declined),
            other => Err(AppError::Validation(format!("unknown post status '{other}'"))),
        }
    }
}

/// The fundamental unit of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub status: PostStatus,
    /// Owner of the post; never changes after creation.
    pub author_id: UserId,
    /// Admin who last transitioned the status. `None` iff `status == Pending`.
    pub moderator_id: Option<UserId>,
    /// The approval notification, if the post has been approved since its last edit.
    pub notification_id: Option<NotificationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Checks the moderator/status invariant.
    pub fn is_consistent(&self) -> bool {
        (self.status == PostStatus::Pending) == self.moderator_id.is_none()
    }
}

/// Input for inserting a freshly created post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Author-initiated content change. Applying it always sends the post back
/// to review.
#[derive(Debug, Clone)]
pub struct ContentEdit {
    pub post_id: PostId,
    pub author_id: UserId,
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

/// An admin decision on a post.
#[derive(Debug, Clone)]
pub struct ModerationDecision {
    pub post_id: PostId,
    pub status: PostStatus,
    pub moderator_id: UserId,
    pub decided_at: DateTime<Utc>,
    /// Notification to attach if the post does not already carry one.
    pub approval_notice: Option<NewNotification>,
}

/// Result of applying a [`ModerationDecision`].
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    pub post: Post,
    /// `true` when this decision created the post's notification.
    pub notification_created: bool,
}

// ─── Inspire ─────────────────────────────────────────────────────────────────

/// A user's "inspire" (like) on a post. Unique per (post, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspire {
    pub id: InspireId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

// ─── Notification ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Sent to an author when their post is approved.
    Approved,
    /// Admin broadcast.
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Approved => "APPROVED",
            NotificationKind::System => "SYSTEM",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "APPROVED" => Ok(NotificationKind::Approved),
            "SYSTEM" => Ok(NotificationKind::System),
            other => Err(AppError::Validation(format!("unknown notification kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub content: String,
    pub kind: NotificationKind,
    /// `None` for broadcasts addressed to every user.
    pub recipient_id: Option<UserId>,
    pub post_id: Option<PostId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub content: String,
    pub kind: NotificationKind,
    pub recipient_id: Option<UserId>,
    pub post_id: Option<PostId>,
    pub created_at: DateTime<Utc>,
}

// ─── Read side ───────────────────────────────────────────────────────────────

/// Public profile data owned by the external profile directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// The externally visible shape of a post, as assembled for a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub content: String,
    pub status: PostStatus,
    pub author_id: UserId,
    pub author_name: Option<String>,
    /// Base64-encoded avatar image, absent when the author has none.
    pub author_avatar: Option<String>,
    pub moderator_id: Option<UserId>,
    pub moderator_name: Option<String>,
    pub like_count: u64,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

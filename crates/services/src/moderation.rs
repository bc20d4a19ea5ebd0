//! Moderation Engine: post creation, author edits, admin status decisions
//! and deletion, plus the status-filtered listings built on top of them.
//!
//! ```text
//!   (none) --create--> PENDING --edit--> PENDING
//!   PENDING --approve--> APPROVED (+ one notification)
//!   PENDING --decline--> DECLINED
//!   APPROVED / DECLINED --edit--> PENDING
//! ```

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AppError, ContentEdit, Identity, ModerationDecision, NewNotification, NewPost,
    NotificationKind, Page, PageRequest, Post, PostId, PostQuery, PostRepository, PostStatus,
    ProfileDirectory, Result, SortOrder,
};
use tracing::{info, warn};

use crate::{require_admin, store_failure};

/// Body of the notification an author receives when a post is approved.
pub const APPROVAL_MESSAGE: &str = "Your post has been approved and is now visible in the feed.";

/// Whose posts to list.
#[derive(Debug, Clone, Copy)]
pub enum AuthorSelector<'a> {
    /// The caller's own posts, in every status.
    Own(&'a Identity),
    /// Approved posts of the user registered under this email.
    Email(&'a str),
}

pub struct ModerationService {
    posts: Arc<dyn PostRepository>,
    profiles: Arc<dyn ProfileDirectory>,
}

impl ModerationService {
    pub fn new(posts: Arc<dyn PostRepository>, profiles: Arc<dyn ProfileDirectory>) -> Self {
        Self { posts, profiles }
    }

    pub async fn create_post(&self, identity: &Identity, content: String) -> Result<Post> {
        let post = self
            .posts
            .insert(NewPost {
                content,
                author_id: identity.subject,
                created_at: Utc::now(),
            })
            .await
            .map_err(store_failure("post.insert"))?;

        info!(post_id = %post.id, author = %identity.subject, "post submitted for review");
        Ok(post)
    }

    /// Owner-only. A post that exists but belongs to someone else is reported
    /// as `NotFound` so that edits do not reveal other users' post ids.
    pub async fn edit_post(
        &self,
        identity: &Identity,
        post_id: PostId,
        content: String,
    ) -> Result<Post> {
        let edit = ContentEdit {
            post_id,
            author_id: identity.subject,
            content,
            edited_at: Utc::now(),
        };

        match self
            .posts
            .apply_edit(edit)
            .await
            .map_err(store_failure("post.apply_edit"))?
        {
            Some(post) => {
                info!(post_id = %post.id, "post edited, back in review");
                Ok(post)
            }
            None => {
                warn!(
                    post_id = %post_id,
                    user = %identity.subject,
                    "edit rejected: no such post for user"
                );
                Err(AppError::not_found("post", post_id))
            }
        }
    }

    pub async fn transition_status(
        &self,
        identity: &Identity,
        post_id: PostId,
        status: PostStatus,
    ) -> Result<Post> {
        require_admin(identity, "change post status")?;

        if status == PostStatus::Pending {
            return Err(AppError::InvalidOperation(
                "a post returns to PENDING only by being edited".into(),
            ));
        }

        let current = self
            .posts
            .find_by_id(post_id)
            .await
            .map_err(store_failure("post.find_by_id"))?
            .ok_or_else(|| AppError::not_found("post", post_id))?;

        let now = Utc::now();
        let approval_notice = (status == PostStatus::Approved).then(|| NewNotification {
            content: APPROVAL_MESSAGE.to_string(),
            kind: NotificationKind::Approved,
            recipient_id: Some(current.author_id),
            post_id: Some(post_id),
            created_at: now,
        });

        let outcome = self
            .posts
            .apply_decision(ModerationDecision {
                post_id,
                status,
                moderator_id: identity.subject,
                decided_at: now,
                approval_notice,
            })
            .await
            .map_err(store_failure("post.apply_decision"))?
            .ok_or_else(|| AppError::not_found("post", post_id))?;

        info!(
            post_id = %post_id,
            status = %status,
            moderator = %identity.subject,
            notified = outcome.notification_created,
            "post moderated"
        );
        Ok(outcome.post)
    }

    pub async fn delete_post(&self, identity: &Identity, post_id: PostId) -> Result<()> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await
            .map_err(store_failure("post.find_by_id"))?
            .ok_or_else(|| AppError::not_found("post", post_id))?;

        if post.author_id != identity.subject {
            warn!(post_id = %post_id, user = %identity.subject, "delete rejected: not the author");
            return Err(AppError::Forbidden("only the author may delete a post".into()));
        }

        let deleted = self
            .posts
            .delete(post_id, identity.subject)
            .await
            .map_err(store_failure("post.delete"))?;

        if !deleted {
            return Err(AppError::not_found("post", post_id));
        }
        info!(post_id = %post_id, "post deleted");
        Ok(())
    }

    pub async fn get_post(&self, post_id: PostId) -> Result<Option<Post>> {
        self.posts
            .find_by_id(post_id)
            .await
            .map_err(store_failure("post.find_by_id"))
    }

    /// Approved posts, newest first.
    pub async fn list_approved_feed(&self, page: PageRequest) -> Result<Page<Post>> {
        let query = PostQuery {
            status: Some(PostStatus::Approved),
            order: SortOrder::Descending,
            ..PostQuery::default()
        };
        self.list(query, page).await
    }

    /// The review queue, oldest first. An admin never sees their own
    /// submissions here, so nobody approves their own posts.
    pub async fn list_pending_for_review(
        &self,
        identity: &Identity,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        require_admin(identity, "review pending posts")?;

        let query = PostQuery {
            status: Some(PostStatus::Pending),
            exclude_author_id: Some(identity.subject),
            order: SortOrder::Ascending,
            ..PostQuery::default()
        };
        self.list(query, page).await
    }

    pub async fn list_by_author(
        &self,
        selector: AuthorSelector<'_>,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        let query = match selector {
            AuthorSelector::Own(identity) => PostQuery {
                author_id: Some(identity.subject),
                ..PostQuery::default()
            },
            AuthorSelector::Email(email) => {
                let profile = self
                    .profiles
                    .find_by_email(email)
                    .await
                    .map_err(store_failure("profile.find_by_email"))?;
                let Some(profile) = profile else {
                    return Ok(Page::empty(page));
                };
                PostQuery {
                    status: Some(PostStatus::Approved),
                    author_id: Some(profile.id),
                    ..PostQuery::default()
                }
            }
        };
        self.list(query, page).await
    }

    async fn list(&self, query: PostQuery, page: PageRequest) -> Result<Page<Post>> {
        self.posts
            .list(query, page)
            .await
            .map_err(store_failure("post.list"))
    }
}

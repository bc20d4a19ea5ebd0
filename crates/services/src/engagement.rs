//! Engagement Engine: inspire (like) and un-inspire.
//!
//! Duplicate likes are rejected by the store's uniqueness guarantee, not by
//! looking for an existing row first: a lookup followed by an insert lets two
//! concurrent requests both see "no like yet" and both insert.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AppError, Identity, Inspire, InspireRepository, PostId, PostRepository, PostStatus, Result,
    StoreError,
};
use tracing::{info, warn};

use crate::store_failure;

pub struct EngagementService {
    posts: Arc<dyn PostRepository>,
    inspires: Arc<dyn InspireRepository>,
}

impl EngagementService {
    pub fn new(posts: Arc<dyn PostRepository>, inspires: Arc<dyn InspireRepository>) -> Self {
        Self { posts, inspires }
    }

    pub async fn like(&self, identity: &Identity, post_id: PostId) -> Result<Inspire> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await
            .map_err(store_failure("post.find_by_id"))?
            .ok_or_else(|| AppError::not_found("post", post_id))?;

        if post.status != PostStatus::Approved {
            warn!(post_id = %post_id, status = %post.status, "like rejected: post not approved");
            return Err(AppError::InvalidOperation(format!(
                "post {post_id} is {} and cannot be inspired",
                post.status
            )));
        }

        match self.inspires.insert(post_id, identity.subject, Utc::now()).await {
            Ok(inspire) => {
                info!(post_id = %post_id, user = %identity.subject, "post inspired");
                Ok(inspire)
            }
            Err(StoreError::UniqueViolation(_)) => {
                warn!(post_id = %post_id, user = %identity.subject, "duplicate like");
                Err(AppError::Conflict(format!(
                    "post {post_id} is already inspired by this user"
                )))
            }
            // The post was deleted between the status check and the insert.
            Err(StoreError::MissingReference(_)) => Err(AppError::not_found("post", post_id)),
            // The post left APPROVED (an edit, a decline) before the insert.
            Err(StoreError::NotEligible(_)) => {
                warn!(post_id = %post_id, "like rejected: post left approved state");
                Err(AppError::InvalidOperation(format!(
                    "post {post_id} is no longer approved and cannot be inspired"
                )))
            }
            Err(other) => Err(store_failure("inspire.insert")(other)),
        }
    }

    pub async fn unlike(&self, identity: &Identity, post_id: PostId) -> Result<()> {
        let removed = self
            .inspires
            .delete(post_id, identity.subject)
            .await
            .map_err(store_failure("inspire.delete"))?;

        if !removed {
            return Err(AppError::not_found(
                "inspire",
                format!("{post_id}/{}", identity.subject),
            ));
        }
        info!(post_id = %post_id, user = %identity.subject, "inspire removed");
        Ok(())
    }

    pub async fn like_count(&self, post_id: PostId) -> Result<u64> {
        let counts = self
            .inspires
            .count_by_posts(&[post_id])
            .await
            .map_err(store_failure("inspire.count_by_posts"))?;
        Ok(counts.get(&post_id).copied().unwrap_or(0))
    }

    pub async fn liked_by(&self, post_id: PostId, identity: &Identity) -> Result<bool> {
        let liked = self
            .inspires
            .liked_among(identity.subject, &[post_id])
            .await
            .map_err(store_failure("inspire.liked_among"))?;
        Ok(liked.contains(&post_id))
    }
}

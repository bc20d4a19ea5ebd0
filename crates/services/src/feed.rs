//! Feed Assembler: turns stored posts into the views returned to clients.
//!
//! Read-only. A page is assembled with one batched like-count query, one
//! batched liked-by-viewer query and one batched display-name lookup.
//! Avatars are best-effort.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use domains::{
    AvatarStore, Identity, InspireRepository, Page, Post, PostId, PostView, ProfileDirectory,
    Result, UserId,
};
use tracing::warn;

use crate::store_failure;

pub struct FeedAssembler {
    inspires: Arc<dyn InspireRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    avatars: Arc<dyn AvatarStore>,
}

impl FeedAssembler {
    pub fn new(
        inspires: Arc<dyn InspireRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        avatars: Arc<dyn AvatarStore>,
    ) -> Self {
        Self {
            inspires,
            profiles,
            avatars,
        }
    }

    pub async fn assemble_one(&self, post: Post, viewer: Option<&Identity>) -> Result<PostView> {
        let mut views = self.assemble_all(vec![post], viewer).await?;
        // assemble_all yields exactly one view per input post
        Ok(views.remove(0))
    }

    pub async fn assemble(
        &self,
        page: Page<Post>,
        viewer: Option<&Identity>,
    ) -> Result<Page<PostView>> {
        let Page {
            items,
            page,
            size,
            total,
        } = page;
        let items = self.assemble_all(items, viewer).await?;
        Ok(Page {
            items,
            page,
            size,
            total,
        })
    }

    async fn assemble_all(
        &self,
        posts: Vec<Post>,
        viewer: Option<&Identity>,
    ) -> Result<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();
        let authors: BTreeSet<UserId> = posts.iter().map(|p| p.author_id).collect();
        let people: Vec<UserId> = posts
            .iter()
            .flat_map(|p| std::iter::once(p.author_id).chain(p.moderator_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let counts = self
            .inspires
            .count_by_posts(&post_ids)
            .await
            .map_err(store_failure("inspire.count_by_posts"))?;

        let liked: HashSet<PostId> = match viewer {
            Some(identity) => self
                .inspires
                .liked_among(identity.subject, &post_ids)
                .await
                .map_err(store_failure("inspire.liked_among"))?,
            None => HashSet::new(),
        };

        let names = self
            .profiles
            .display_names(&people)
            .await
            .map_err(store_failure("profile.display_names"))?;

        let mut avatars: HashMap<UserId, Option<String>> = HashMap::with_capacity(authors.len());
        for author in authors {
            avatars.insert(author, self.avatar_of(author).await);
        }

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                id: post.id,
                like_count: counts.get(&post.id).copied().unwrap_or(0),
                liked_by_me: liked.contains(&post.id),
                author_name: names.get(&post.author_id).cloned(),
                author_avatar: avatars.get(&post.author_id).cloned().flatten(),
                moderator_name: post.moderator_id.and_then(|m| names.get(&m).cloned()),
                content: post.content,
                status: post.status,
                author_id: post.author_id,
                moderator_id: post.moderator_id,
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
            .collect())
    }

    async fn avatar_of(&self, user: UserId) -> Option<String> {
        match self.avatars.avatar(user).await {
            Ok(bytes) => bytes.map(|b| STANDARD.encode(&b)),
            Err(e) => {
                warn!(user = %user, error = %e, "avatar lookup failed, rendering without it");
                None
            }
        }
    }
}

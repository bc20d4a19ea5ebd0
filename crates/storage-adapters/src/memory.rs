//! # In-memory store
//!
//! Implements the post, inspire and notification ports over a single set of
//! tables guarded by one `RwLock`. Every port method takes the lock once and
//! performs all of its reads and writes without yielding, which makes each
//! call a transaction: concurrent callers observe either none or all of it,
//! and a caller dropped while waiting for the lock has applied nothing.
//!
//! Used by the binary when no database is configured and by the test suites.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domains::{
    AvatarStore, ContentEdit, Inspire, InspireId, InspireRepository, ModerationDecision,
    ModerationOutcome, NewNotification, NewPost, Notification, NotificationId,
    NotificationRepository, Page, PageRequest, Post, PostId, PostQuery, PostRepository,
    PostStatus, Profile, ProfileDirectory, SortOrder, StoreError, StoreResult, UserId,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    last_post_id: i64,
    last_inspire_id: i64,
    last_notification_id: i64,
    posts: BTreeMap<PostId, Post>,
    /// Keyed by the unique (post, user) pair.
    inspires: HashMap<(PostId, UserId), Inspire>,
    notifications: BTreeMap<NotificationId, Notification>,
}

impl Tables {
    fn insert_notification(&mut self, new: NewNotification) -> Notification {
        self.last_notification_id += 1;
        let notification = Notification {
            id: NotificationId(self.last_notification_id),
            content: new.content,
            kind: new.kind,
            recipient_id: new.recipient_id,
            post_id: new.post_id,
            created_at: new.created_at,
        };
        self.notifications.insert(notification.id, notification.clone());
        notification
    }
}

/// Cloning is cheap; clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .cloned()
        .collect();
    Page::new(items, page, total)
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn insert(&self, new: NewPost) -> StoreResult<Post> {
        let mut t = self.tables.write().await;
        t.last_post_id += 1;
        let post = Post {
            id: PostId(t.last_post_id),
            content: new.content,
            status: PostStatus::Pending,
            author_id: new.author_id,
            moderator_id: None,
            notification_id: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        t.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: PostId) -> StoreResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn apply_edit(&self, edit: ContentEdit) -> StoreResult<Option<Post>> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let Some(post) = t
            .posts
            .get_mut(&edit.post_id)
            .filter(|p| p.author_id == edit.author_id)
        else {
            return Ok(None);
        };

        post.content = edit.content;
        post.status = PostStatus::Pending;
        post.moderator_id = None;
        post.updated_at = edit.edited_at;
        if let Some(stale) = post.notification_id.take() {
            t.notifications.remove(&stale);
        }
        Ok(Some(post.clone()))
    }

    async fn apply_decision(
        &self,
        decision: ModerationDecision,
    ) -> StoreResult<Option<ModerationOutcome>> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let Some(has_notification) = t
            .posts
            .get(&decision.post_id)
            .map(|p| p.notification_id.is_some())
        else {
            return Ok(None);
        };

        let attach = match decision.approval_notice {
            Some(notice) if !has_notification => Some(t.insert_notification(notice)),
            _ => None,
        };

        let Some(post) = t.posts.get_mut(&decision.post_id) else {
            return Ok(None);
        };
        post.status = decision.status;
        post.moderator_id = Some(decision.moderator_id);
        post.updated_at = decision.decided_at;
        if let Some(notification) = &attach {
            post.notification_id = Some(notification.id);
        }

        Ok(Some(ModerationOutcome {
            post: post.clone(),
            notification_created: attach.is_some(),
        }))
    }

    async fn delete(&self, id: PostId, author_id: UserId) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if !t.posts.get(&id).is_some_and(|p| p.author_id == author_id) {
            return Ok(false);
        }
        let removed = t.posts.remove(&id);
        if let Some(nid) = removed.and_then(|p| p.notification_id) {
            t.notifications.remove(&nid);
        }
        t.inspires.retain(|(post_id, _), _| *post_id != id);
        Ok(true)
    }

    async fn list(&self, query: PostQuery, page: PageRequest) -> StoreResult<Page<Post>> {
        let t = self.tables.read().await;
        let mut rows: Vec<&Post> = t.posts.values().filter(|p| query.matches(p)).collect();
        if query.order == SortOrder::Descending {
            rows.reverse();
        }
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl InspireRepository for InMemoryStore {
    async fn insert(
        &self,
        post_id: PostId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Inspire> {
        let mut t = self.tables.write().await;
        match t.posts.get(&post_id) {
            None => return Err(StoreError::MissingReference(format!("post {post_id}"))),
            Some(post) if post.status != PostStatus::Approved => {
                return Err(StoreError::NotEligible(format!(
                    "post {post_id} is {}",
                    post.status
                )));
            }
            Some(_) => {}
        }
        if t.inspires.contains_key(&(post_id, user_id)) {
            return Err(StoreError::UniqueViolation(format!(
                "inspire ({post_id}, {user_id})"
            )));
        }
        t.last_inspire_id += 1;
        let inspire = Inspire {
            id: InspireId(t.last_inspire_id),
            post_id,
            user_id,
            created_at: at,
        };
        t.inspires.insert((post_id, user_id), inspire.clone());
        Ok(inspire)
    }

    async fn delete(&self, post_id: PostId, user_id: UserId) -> StoreResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .inspires
            .remove(&(post_id, user_id))
            .is_some())
    }

    async fn count_by_posts(&self, post_ids: &[PostId]) -> StoreResult<HashMap<PostId, u64>> {
        let wanted: HashSet<PostId> = post_ids.iter().copied().collect();
        let t = self.tables.read().await;
        let mut counts = HashMap::new();
        for (post_id, _) in t.inspires.keys().filter(|(p, _)| wanted.contains(p)) {
            *counts.entry(*post_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn liked_among(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> StoreResult<HashSet<PostId>> {
        let t = self.tables.read().await;
        Ok(post_ids
            .iter()
            .filter(|p| t.inspires.contains_key(&(**p, user_id)))
            .copied()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert(&self, notification: NewNotification) -> StoreResult<Notification> {
        Ok(self.tables.write().await.insert_notification(notification))
    }

    async fn find_by_id(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn list_for_recipient(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Page<Notification>> {
        let t = self.tables.read().await;
        let rows: Vec<&Notification> = t
            .notifications
            .values()
            .rev()
            .filter(|n| n.recipient_id.map_or(true, |r| r == user_id))
            .collect();
        Ok(paginate(rows, page))
    }
}

/// Profile directory backed by a concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryProfiles {
    by_id: Arc<DashMap<UserId, Profile>>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: Profile) {
        self.by_id.insert(profile.id, profile);
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryProfiles {
    async fn display_names(&self, ids: &[UserId]) -> StoreResult<HashMap<UserId, String>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|p| (*id, p.name.clone())))
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(self
            .by_id
            .iter()
            .find(|entry| entry.value().email.eq_ignore_ascii_case(email))
            .map(|entry| entry.value().clone()))
    }
}

/// Avatar store backed by a concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryAvatars {
    by_user: Arc<DashMap<UserId, Bytes>>,
}

impl InMemoryAvatars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, user_id: UserId, image: Bytes) {
        self.by_user.insert(user_id, image);
    }
}

#[async_trait]
impl AvatarStore for InMemoryAvatars {
    async fn avatar(&self, user_id: UserId) -> anyhow::Result<Option<Bytes>> {
        Ok(self.by_user.get(&user_id).map(|b| b.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::NotificationKind;

    fn new_post(author: UserId, text: &str) -> NewPost {
        NewPost {
            content: text.into(),
            author_id: author,
            created_at: Utc::now(),
        }
    }

    fn approval(post: &Post, moderator: UserId) -> ModerationDecision {
        ModerationDecision {
            post_id: post.id,
            status: PostStatus::Approved,
            moderator_id: moderator,
            decided_at: Utc::now(),
            approval_notice: Some(NewNotification {
                content: "approved".into(),
                kind: NotificationKind::Approved,
                recipient_id: Some(post.author_id),
                post_id: Some(post.id),
                created_at: Utc::now(),
            }),
        }
    }

    fn page() -> PageRequest {
        PageRequest::new(0, 50).unwrap()
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_feed_is_newest_first() {
        let store = InMemoryStore::new();
        let author = UserId::new();
        let admin = UserId::new();
        for text in ["a", "b", "c"] {
            let post = PostRepository::insert(&store, new_post(author, text)).await.unwrap();
            store.apply_decision(approval(&post, admin)).await.unwrap();
        }

        let query = PostQuery {
            status: Some(PostStatus::Approved),
            ..PostQuery::default()
        };
        let listed = store.list(query, PageRequest::new(0, 2).unwrap()).await.unwrap();
        let ids: Vec<i64> = listed.items.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(listed.total, 3);
    }

    #[tokio::test]
    async fn second_approval_does_not_add_a_notification() {
        let store = InMemoryStore::new();
        let post = PostRepository::insert(&store, new_post(UserId::new(), "x")).await.unwrap();
        let admin = UserId::new();

        let first = store.apply_decision(approval(&post, admin)).await.unwrap().unwrap();
        let second = store.apply_decision(approval(&post, admin)).await.unwrap().unwrap();
        assert!(first.notification_created);
        assert!(!second.notification_created);
        assert_eq!(first.post.notification_id, second.post.notification_id);

        let inbox = store.list_for_recipient(post.author_id, page()).await.unwrap();
        assert_eq!(inbox.total, 1);
    }

    #[tokio::test]
    async fn edit_by_author_resets_review_and_drops_notification() {
        let store = InMemoryStore::new();
        let post = PostRepository::insert(&store, new_post(UserId::new(), "x")).await.unwrap();
        let approved = store
            .apply_decision(approval(&post, UserId::new()))
            .await
            .unwrap()
            .unwrap()
            .post;
        let stale = approved.notification_id.unwrap();

        let edited = store
            .apply_edit(ContentEdit {
                post_id: post.id,
                author_id: post.author_id,
                content: "y".into(),
                edited_at: Utc::now(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.status, PostStatus::Pending);
        assert!(edited.moderator_id.is_none() && edited.notification_id.is_none());
        assert!(NotificationRepository::find_by_id(&store, stale).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn edit_by_stranger_matches_nothing() {
        let store = InMemoryStore::new();
        let post = PostRepository::insert(&store, new_post(UserId::new(), "x")).await.unwrap();
        let result = store
            .apply_edit(ContentEdit {
                post_id: post.id,
                author_id: UserId::new(),
                content: "hijack".into(),
                edited_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(result.is_none());
        let unchanged = PostRepository::find_by_id(&store, post.id).await.unwrap().unwrap();
        assert_eq!(unchanged.content, "x");
    }

    #[tokio::test]
    async fn duplicate_inspire_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let post = PostRepository::insert(&store, new_post(UserId::new(), "x")).await.unwrap();
        store.apply_decision(approval(&post, UserId::new())).await.unwrap();
        let fan = UserId::new();

        InspireRepository::insert(&store, post.id, fan, Utc::now()).await.unwrap();
        let err = InspireRepository::insert(&store, post.id, fan, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let missing = InspireRepository::insert(&store, PostId(999), fan, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::MissingReference(_)));
    }

    #[tokio::test]
    async fn inspire_requires_approved_post_at_write_time() {
        let store = InMemoryStore::new();
        let post = PostRepository::insert(&store, new_post(UserId::new(), "x")).await.unwrap();
        let fan = UserId::new();

        let pending = InspireRepository::insert(&store, post.id, fan, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(pending, StoreError::NotEligible(_)));

        store.apply_decision(approval(&post, UserId::new())).await.unwrap();
        store
            .apply_edit(ContentEdit {
                post_id: post.id,
                author_id: post.author_id,
                content: "y".into(),
                edited_at: Utc::now(),
            })
            .await
            .unwrap();
        let reset = InspireRepository::insert(&store, post.id, fan, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(reset, StoreError::NotEligible(_)));
        assert!(store.count_by_posts(&[post.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_to_inspires_and_notification() {
        let store = InMemoryStore::new();
        let post = PostRepository::insert(&store, new_post(UserId::new(), "x")).await.unwrap();
        let approved = store
            .apply_decision(approval(&post, UserId::new()))
            .await
            .unwrap()
            .unwrap()
            .post;
        InspireRepository::insert(&store, post.id, UserId::new(), Utc::now()).await.unwrap();

        assert!(!PostRepository::delete(&store, post.id, UserId::new()).await.unwrap());
        assert!(PostRepository::delete(&store, post.id, post.author_id).await.unwrap());

        assert!(store.count_by_posts(&[post.id]).await.unwrap().is_empty());
        let nid = approved.notification_id.unwrap();
        assert!(NotificationRepository::find_by_id(&store, nid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inbox_includes_broadcasts_but_not_other_users() {
        let store = InMemoryStore::new();
        let me = UserId::new();
        for recipient in [Some(me), None, Some(UserId::new())] {
            NotificationRepository::insert(
                &store,
                NewNotification {
                    content: "hi".into(),
                    kind: NotificationKind::System,
                    recipient_id: recipient,
                    post_id: None,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        let inbox = store.list_for_recipient(me, page()).await.unwrap();
        assert_eq!(inbox.total, 2);
        assert!(inbox.items[0].id > inbox.items[1].id);
    }

    #[tokio::test]
    async fn profiles_resolve_names_and_emails() {
        let profiles = InMemoryProfiles::new();
        let id = UserId::new();
        profiles.upsert(Profile {
            id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
        });

        let names = profiles.display_names(&[id, UserId::new()]).await.unwrap();
        assert_eq!(names.len(), 1);
        let found = profiles.find_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(id));
    }
}

use std::sync::Arc;

use domains::{
    AppError, MockInspireRepository, MockPostRepository, MockProfileDirectory, PageRequest,
    PostId, PostStatus, Role, StoreError,
};
use integration_tests::identity;
use mockall::predicate::eq;
use services::{EngagementService, ModerationService};
use tokio_test::assert_err;

fn backend_down() -> StoreError {
    StoreError::Backend(anyhow::anyhow!("connection reset by peer"))
}

#[tokio::test]
async fn backend_failure_surfaces_as_opaque_persistence_error() {
    let mut posts = MockPostRepository::new();
    posts.expect_list().returning(|_, _| Err(backend_down()));

    let moderation = ModerationService::new(Arc::new(posts), Arc::new(MockProfileDirectory::new()));
    let err = assert_err!(
        moderation
            .list_approved_feed(PageRequest::new(0, 10).unwrap())
            .await
    );

    assert!(matches!(err, AppError::Persistence(_)));
    assert_eq!(err.to_string(), "persistence failure");
}

#[tokio::test]
async fn failed_lookup_aborts_transition_before_any_write() {
    let mut posts = MockPostRepository::new();
    posts
        .expect_find_by_id()
        .with(eq(PostId(4)))
        .returning(|_| Err(backend_down()));
    posts.expect_apply_decision().never();

    let moderation = ModerationService::new(Arc::new(posts), Arc::new(MockProfileDirectory::new()));
    let admin = identity(Role::Admin, "admin@example.com");
    let err = assert_err!(
        moderation
            .transition_status(&admin, PostId(4), PostStatus::Approved)
            .await
    );

    assert!(matches!(err, AppError::Persistence(_)));
}

#[tokio::test]
async fn like_insert_failure_is_not_a_conflict() {
    let author = identity(Role::User, "a@example.com");
    let liker = identity(Role::User, "b@example.com");
    let author_id = author.subject;

    let mut posts = MockPostRepository::new();
    posts.expect_find_by_id().returning(move |id| {
        let now = chrono::Utc::now();
        Ok(Some(domains::Post {
            id,
            content: "x".into(),
            status: PostStatus::Approved,
            author_id,
            moderator_id: Some(domains::UserId::new()),
            notification_id: None,
            created_at: now,
            updated_at: now,
        }))
    });
    let mut inspires = MockInspireRepository::new();
    inspires.expect_insert().returning(|_, _, _| Err(backend_down()));

    let engagement = EngagementService::new(Arc::new(posts), Arc::new(inspires));
    let err = assert_err!(engagement.like(&liker, PostId(1)).await);
    assert!(matches!(err, AppError::Persistence(_)));
}

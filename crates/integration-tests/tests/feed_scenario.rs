use bytes::Bytes;
use domains::{AppError, NotificationKind, NotificationRepository, PageRequest, PostStatus};
use integration_tests::Harness;
use services::AuthorSelector;

fn page() -> PageRequest {
    PageRequest::new(0, 20).unwrap()
}

#[tokio::test]
async fn approve_like_edit_decline_lifecycle() {
    let h = Harness::new();

    let p1 = h.moderation.create_post(&h.u1, "first light".into()).await.unwrap();
    assert_eq!(p1.status, PostStatus::Pending);
    assert!(p1.moderator_id.is_none());

    let approved = h
        .moderation
        .transition_status(&h.admin, p1.id, PostStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, PostStatus::Approved);
    assert_eq!(approved.moderator_id, Some(h.admin.subject));
    let n1 = approved.notification_id.expect("approval creates a notification");

    let inbox = h
        .notifications
        .list_for_recipient(&h.u1, h.u1.subject, page())
        .await
        .unwrap();
    assert_eq!(inbox.total, 1);
    assert_eq!(inbox.items[0].kind, NotificationKind::Approved);
    assert_eq!(inbox.items[0].post_id, Some(p1.id));

    h.engagement.like(&h.u2, p1.id).await.unwrap();
    assert_eq!(h.engagement.like_count(p1.id).await.unwrap(), 1);
    assert!(h.engagement.liked_by(p1.id, &h.u2).await.unwrap());
    assert!(!h.engagement.liked_by(p1.id, &h.u1).await.unwrap());

    let edited = h
        .moderation
        .edit_post(&h.u1, p1.id, "first light, revised".into())
        .await
        .unwrap();
    assert_eq!(edited.status, PostStatus::Pending);
    assert!(edited.moderator_id.is_none());
    assert!(edited.notification_id.is_none());
    assert!(NotificationRepository::find_by_id(&h.store, n1).await.unwrap().is_none());
    // editing keeps likes
    assert_eq!(h.engagement.like_count(p1.id).await.unwrap(), 1);

    let declined = h
        .moderation
        .transition_status(&h.admin, p1.id, PostStatus::Declined)
        .await
        .unwrap();
    assert_eq!(declined.status, PostStatus::Declined);
    assert_eq!(declined.moderator_id, Some(h.admin.subject));
    assert!(declined.notification_id.is_none());

    let inbox = h
        .notifications
        .list_for_recipient(&h.u1, h.u1.subject, page())
        .await
        .unwrap();
    assert!(inbox.is_empty());
}

#[tokio::test]
async fn double_like_conflicts_and_count_stays_one() {
    let h = Harness::new();
    let p1 = h.moderation.create_post(&h.u1, "hello".into()).await.unwrap();
    h.moderation
        .transition_status(&h.admin, p1.id, PostStatus::Approved)
        .await
        .unwrap();

    h.engagement.like(&h.u1, p1.id).await.unwrap();
    let err = h.engagement.like(&h.u1, p1.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.engagement.like_count(p1.id).await.unwrap(), 1);
}

#[tokio::test]
async fn non_admin_transition_is_forbidden_and_leaves_post_unchanged() {
    let h = Harness::new();
    let p1 = h.moderation.create_post(&h.u1, "hello".into()).await.unwrap();

    let err = h
        .moderation
        .transition_status(&h.u2, p1.id, PostStatus::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let after = h.moderation.get_post(p1.id).await.unwrap().unwrap();
    assert_eq!(after, p1);
}

#[tokio::test]
async fn repeated_approval_keeps_a_single_notification() {
    let h = Harness::new();
    let p1 = h.moderation.create_post(&h.u1, "hello".into()).await.unwrap();

    let first = h
        .moderation
        .transition_status(&h.admin, p1.id, PostStatus::Approved)
        .await
        .unwrap();
    h.moderation
        .transition_status(&h.admin, p1.id, PostStatus::Declined)
        .await
        .unwrap();
    let again = h
        .moderation
        .transition_status(&h.admin, p1.id, PostStatus::Approved)
        .await
        .unwrap();

    assert_eq!(first.notification_id, again.notification_id);
    let inbox = h
        .notifications
        .list_for_recipient(&h.u1, h.u1.subject, page())
        .await
        .unwrap();
    assert_eq!(inbox.total, 1);
}

#[tokio::test]
async fn only_approved_posts_can_be_liked() {
    let h = Harness::new();
    let pending = h.moderation.create_post(&h.u1, "pending".into()).await.unwrap();
    let declined = h.moderation.create_post(&h.u1, "declined".into()).await.unwrap();
    h.moderation
        .transition_status(&h.admin, declined.id, PostStatus::Declined)
        .await
        .unwrap();

    for id in [pending.id, declined.id] {
        let err = h.engagement.like(&h.u2, id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }
}

#[tokio::test]
async fn delete_cascades_likes_and_notification() {
    let h = Harness::new();
    let p1 = h.moderation.create_post(&h.u1, "short-lived".into()).await.unwrap();
    let approved = h
        .moderation
        .transition_status(&h.admin, p1.id, PostStatus::Approved)
        .await
        .unwrap();
    h.engagement.like(&h.u2, p1.id).await.unwrap();

    let err = h.moderation.delete_post(&h.u2, p1.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    h.moderation.delete_post(&h.u1, p1.id).await.unwrap();

    assert!(h.moderation.get_post(p1.id).await.unwrap().is_none());
    assert_eq!(h.engagement.like_count(p1.id).await.unwrap(), 0);
    assert!(!h.engagement.liked_by(p1.id, &h.u2).await.unwrap());
    let notice = approved.notification_id.unwrap();
    assert!(NotificationRepository::find_by_id(&h.store, notice).await.unwrap().is_none());

    let err = h.moderation.delete_post(&h.u1, p1.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(..)));
}

#[tokio::test]
async fn review_queue_hides_the_admins_own_posts() {
    let h = Harness::new();
    let theirs = h.moderation.create_post(&h.u1, "from u1".into()).await.unwrap();
    h.moderation.create_post(&h.admin, "from admin".into()).await.unwrap();

    let queue = h.moderation.list_pending_for_review(&h.admin, page()).await.unwrap();
    assert_eq!(queue.total, 1);
    assert_eq!(queue.items[0].id, theirs.id);

    let err = h.moderation.list_pending_for_review(&h.u1, page()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn author_listings() {
    let h = Harness::new();
    let a = h.moderation.create_post(&h.u1, "a".into()).await.unwrap();
    let b = h.moderation.create_post(&h.u1, "b".into()).await.unwrap();
    h.moderation
        .transition_status(&h.admin, a.id, PostStatus::Approved)
        .await
        .unwrap();

    let own = h
        .moderation
        .list_by_author(AuthorSelector::Own(&h.u1), page())
        .await
        .unwrap();
    let ids: Vec<_> = own.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);

    let public = h
        .moderation
        .list_by_author(AuthorSelector::Email("U1@example.com"), page())
        .await
        .unwrap();
    assert_eq!(public.total, 1);
    assert_eq!(public.items[0].id, a.id);

    let nobody = h
        .moderation
        .list_by_author(AuthorSelector::Email("ghost@example.com"), page())
        .await
        .unwrap();
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn feed_views_carry_names_avatar_and_likes() {
    let h = Harness::new();
    h.avatars.put(h.u1.subject, Bytes::from_static(b"img"));

    let p1 = h.moderation.create_post(&h.u1, "with face".into()).await.unwrap();
    h.moderation
        .transition_status(&h.admin, p1.id, PostStatus::Approved)
        .await
        .unwrap();
    h.engagement.like(&h.u2, p1.id).await.unwrap();

    let feed = h.moderation.list_approved_feed(page()).await.unwrap();
    let views = h.feed.assemble(feed, Some(&h.u2)).await.unwrap();
    let view = &views.items[0];

    assert_eq!(view.author_name.as_deref(), Some("Una"));
    assert_eq!(view.moderator_name.as_deref(), Some("Ada"));
    assert_eq!(view.author_avatar.as_deref(), Some("aW1n"));
    assert_eq!(view.like_count, 1);
    assert!(view.liked_by_me);

    let anonymous = h
        .feed
        .assemble(h.moderation.list_approved_feed(page()).await.unwrap(), None)
        .await
        .unwrap();
    assert!(!anonymous.items[0].liked_by_me);
}

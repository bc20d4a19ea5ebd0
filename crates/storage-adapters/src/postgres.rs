//! # Postgres store
//!
//! Maps the relational model in `migrations/` onto the domain ports.
//!
//! Invariants are pushed into the schema where Postgres can hold them:
//! `UNIQUE (post_id, user_id)` on inspires decides duplicate likes, a
//! `UNIQUE (post_id)` on notifications bounds approval notices to one per
//! post, and `ON DELETE CASCADE` removes a post's dependents in the same
//! statement that deletes it. A like takes a share lock on its post, so the
//! APPROVED check and the insert see the same row version. Multi-statement
//! writes run in a transaction; a dropped future drops the `Transaction`,
//! which rolls back.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    ContentEdit, Inspire, InspireId, InspireRepository, ModerationDecision, ModerationOutcome,
    NewNotification, NewPost, Notification, NotificationId, NotificationRepository, Page,
    PageRequest, Post, PostId, PostQuery, PostRepository, PostStatus, Profile, ProfileDirectory,
    SortOrder, StoreError, StoreResult, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use tracing::info;
use uuid::Uuid;

const POST_COLUMNS: &str = "p.id, p.content, p.status, p.author_id, p.moderator_id, \
     n.id AS notification_id, p.created_at, p.updated_at";
const POST_FROM: &str = "posts p LEFT JOIN notifications n ON n.post_id = p.id";
const POST_FILTER: &str = "($1::TEXT IS NULL OR p.status = $1) \
     AND ($2::UUID IS NULL OR p.author_id = $2) \
     AND ($3::UUID IS NULL OR p.author_id <> $3)";
const NOTIFICATION_COLUMNS: &str = "id, content, kind, recipient_id, post_id, created_at";

/// Opens a connection pool.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    Ok(pool)
}

/// Applies the embedded migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}

/// Sorts a driver error into the store error kinds the engines act on.
fn classify(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        let constraint = db.constraint().unwrap_or("unnamed").to_string();
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(constraint);
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingReference(constraint);
        }
    }
    StoreError::Backend(err.into())
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(classify)
}

fn order_sql(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    }
}

fn post_from_row(row: &PgRow) -> StoreResult<Post> {
    let status: String = col(row, "status")?;
    Ok(Post {
        id: PostId(col(row, "id")?),
        content: col(row, "content")?,
        status: status
            .parse::<PostStatus>()
            .map_err(|e| StoreError::Backend(anyhow::Error::new(e)))?,
        author_id: UserId(col(row, "author_id")?),
        moderator_id: col::<Option<Uuid>>(row, "moderator_id")?.map(UserId),
        notification_id: col::<Option<i64>>(row, "notification_id")?.map(NotificationId),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
    let kind: String = col(row, "kind")?;
    Ok(Notification {
        id: NotificationId(col(row, "id")?),
        content: col(row, "content")?,
        kind: kind
            .parse()
            .map_err(|e| StoreError::Backend(anyhow::Error::new(e)))?,
        recipient_id: col::<Option<Uuid>>(row, "recipient_id")?.map(UserId),
        post_id: col::<Option<i64>>(row, "post_id")?.map(PostId),
        created_at: col(row, "created_at")?,
    })
}

fn raw_ids(post_ids: &[PostId]) -> Vec<i64> {
    post_ids.iter().map(|p| p.0).collect()
}

/// Implements every storage port over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn insert(&self, new: NewPost) -> StoreResult<Post> {
        let row = sqlx::query(
            "INSERT INTO posts (content, status, author_id, created_at, updated_at) \
             VALUES ($1, 'PENDING', $2, $3, $3) \
             RETURNING id, content, status, author_id, moderator_id, \
                       NULL::BIGINT AS notification_id, created_at, updated_at",
        )
        .bind(&new.content)
        .bind(new.author_id.0)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        post_from_row(&row)
    }

    async fn find_by_id(&self, id: PostId) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM {POST_FROM} WHERE p.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn apply_edit(&self, edit: ContentEdit) -> StoreResult<Option<Post>> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let row = sqlx::query(
            "UPDATE posts \
             SET content = $3, status = 'PENDING', moderator_id = NULL, updated_at = $4 \
             WHERE id = $1 AND author_id = $2 \
             RETURNING id, content, status, author_id, moderator_id, \
                       NULL::BIGINT AS notification_id, created_at, updated_at",
        )
        .bind(edit.post_id.0)
        .bind(edit.author_id.0)
        .bind(&edit.content)
        .bind(edit.edited_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM notifications WHERE post_id = $1")
            .bind(edit.post_id.0)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        post_from_row(&row).map(Some)
    }

    async fn apply_decision(
        &self,
        decision: ModerationDecision,
    ) -> StoreResult<Option<ModerationOutcome>> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // The UPDATE takes the row lock, so concurrent decisions on one post
        // run one after the other.
        let row = sqlx::query(
            "UPDATE posts \
             SET status = $2, moderator_id = $3, updated_at = $4 \
             WHERE id = $1 \
             RETURNING id, content, status, author_id, moderator_id, created_at, updated_at, \
                       (SELECT n.id FROM notifications n WHERE n.post_id = posts.id) \
                           AS notification_id",
        )
        .bind(decision.post_id.0)
        .bind(decision.status.as_str())
        .bind(decision.moderator_id.0)
        .bind(decision.decided_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut post = post_from_row(&row)?;

        let mut notification_created = false;
        if let Some(notice) = decision.approval_notice.filter(|_| post.notification_id.is_none()) {
            let inserted: Option<i64> = sqlx::query_scalar(
                "INSERT INTO notifications (content, kind, recipient_id, post_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (post_id) DO NOTHING \
                 RETURNING id",
            )
            .bind(&notice.content)
            .bind(notice.kind.as_str())
            .bind(notice.recipient_id.map(|u| u.0))
            .bind(notice.post_id.map(|p| p.0))
            .bind(notice.created_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(classify)?;

            notification_created = inserted.is_some();
            post.notification_id = match inserted {
                Some(id) => Some(NotificationId(id)),
                None => sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM notifications WHERE post_id = $1",
                )
                .bind(decision.post_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(classify)?
                .map(NotificationId),
            };
        }

        tx.commit().await.map_err(classify)?;
        Ok(Some(ModerationOutcome {
            post,
            notification_created,
        }))
    }

    async fn delete(&self, id: PostId, author_id: UserId) -> StoreResult<bool> {
        // inspires and notifications follow through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(id.0)
            .bind(author_id.0)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: PostQuery, page: PageRequest) -> StoreResult<Page<Post>> {
        let status = query.status.map(|s| s.as_str());
        let author = query.author_id.map(|u| u.0);
        let excluded = query.exclude_author_id.map(|u| u.0);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM posts p WHERE {POST_FILTER}"
        ))
        .bind(status)
        .bind(author)
        .bind(excluded)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM {POST_FROM} WHERE {POST_FILTER} \
             ORDER BY p.id {} LIMIT $4 OFFSET $5",
            order_sql(query.order)
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(author)
            .bind(excluded)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        let items = rows.iter().map(post_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(items, page, total.max(0) as u64))
    }
}

#[async_trait]
impl InspireRepository for PgStore {
    async fn insert(
        &self,
        post_id: PostId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Inspire> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // FOR SHARE holds off edits and decisions on the post until commit,
        // so the status read here is the status the like lands on.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM posts WHERE id = $1 FOR SHARE")
                .bind(post_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(classify)?;

        match status.as_deref() {
            None => return Err(StoreError::MissingReference(format!("post {post_id}"))),
            Some(status) if status != PostStatus::Approved.as_str() => {
                return Err(StoreError::NotEligible(format!("post {post_id} is {status}")));
            }
            Some(_) => {}
        }

        let row = sqlx::query(
            "INSERT INTO inspires (post_id, user_id, created_at) VALUES ($1, $2, $3) \
             RETURNING id, post_id, user_id, created_at",
        )
        .bind(post_id.0)
        .bind(user_id.0)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;

        Ok(Inspire {
            id: InspireId(col(&row, "id")?),
            post_id: PostId(col(&row, "post_id")?),
            user_id: UserId(col(&row, "user_id")?),
            created_at: col(&row, "created_at")?,
        })
    }

    async fn delete(&self, post_id: PostId, user_id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM inspires WHERE post_id = $1 AND user_id = $2")
            .bind(post_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_posts(&self, post_ids: &[PostId]) -> StoreResult<HashMap<PostId, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT post_id, COUNT(*) AS likes FROM inspires \
             WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(raw_ids(post_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter()
            .map(|row| -> StoreResult<(PostId, u64)> {
                let likes: i64 = col(row, "likes")?;
                Ok((PostId(col(row, "post_id")?), likes.max(0) as u64))
            })
            .collect()
    }

    async fn liked_among(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> StoreResult<HashSet<PostId>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let liked: Vec<i64> = sqlx::query_scalar(
            "SELECT post_id FROM inspires WHERE user_id = $1 AND post_id = ANY($2)",
        )
        .bind(user_id.0)
        .bind(raw_ids(post_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        Ok(liked.into_iter().map(PostId).collect())
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, new: NewNotification) -> StoreResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications (content, kind, recipient_id, post_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new.content)
            .bind(new.kind.as_str())
            .bind(new.recipient_id.map(|u| u.0))
            .bind(new.post_id.map(|p| p.0))
            .bind(new.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        notification_from_row(&row)
    }

    async fn find_by_id(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list_for_recipient(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Page<Notification>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 OR recipient_id IS NULL",
        )
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 OR recipient_id IS NULL \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.0)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        let items = rows
            .iter()
            .map(notification_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(items, page, total.max(0) as u64))
    }
}

#[async_trait]
impl ProfileDirectory for PgStore {
    async fn display_names(&self, ids: &[UserId]) -> StoreResult<HashMap<UserId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let raw: Vec<Uuid> = ids.iter().map(|u| u.0).collect();
        let rows = sqlx::query("SELECT id, name FROM users WHERE id = ANY($1)")
            .bind(raw)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter()
            .map(|row| -> StoreResult<(UserId, String)> {
                Ok((UserId(col(row, "id")?), col(row, "name")?))
            })
            .collect()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.map(|row| -> StoreResult<Profile> {
            Ok(Profile {
                id: UserId(col(&row, "id")?),
                name: col(&row, "name")?,
                email: col(&row, "email")?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_renders_sql_keyword() {
        assert_eq!(order_sql(SortOrder::Ascending), "ASC");
        assert_eq!(order_sql(SortOrder::Descending), "DESC");
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        assert!(matches!(classify(sqlx::Error::RowNotFound), StoreError::Backend(_)));
        assert!(matches!(classify(sqlx::Error::PoolTimedOut), StoreError::Backend(_)));
    }

    #[test]
    fn filter_binds_three_optional_parameters() {
        for placeholder in ["$1", "$2", "$3"] {
            assert!(POST_FILTER.contains(placeholder));
        }
        assert!(!POST_FILTER.contains("$4"));
    }
}

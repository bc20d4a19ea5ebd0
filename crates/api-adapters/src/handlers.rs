//! # Handlers
//!
//! Thin adapters between HTTP and the services: parse, authorize through the
//! extractor, call one service operation, assemble the view.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use domains::{
    AppError, Identity, Inspire, Notification, Page, PageRequest, Post, PostId, PostStatus,
    PostView, UserId,
};
use serde::Deserialize;
use serde_json::json;
use services::AuthorSelector;
use tracing::error;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::AuthIdentity;
use crate::metrics::CONTENT_TYPE;
use crate::state::AppState;

/// Longest post body accepted at the edge.
pub const MAX_POST_LEN: usize = 2000;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageParams {
    fn request(&self) -> Result<PageRequest, AppError> {
        PageRequest::new(self.page.unwrap_or(0), self.size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Deserialize)]
pub struct ByAuthorParams {
    pub email: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBody {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

fn validate_post_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("post content must not be blank".into()));
    }
    if content.chars().count() > MAX_POST_LEN {
        return Err(AppError::Validation(format!(
            "post content must be at most {MAX_POST_LEN} characters"
        )));
    }
    Ok(())
}

async fn view_page(
    state: &AppState,
    posts: Page<Post>,
    viewer: &Identity,
) -> ApiResult<Json<Page<PostView>>> {
    Ok(Json(state.feed.assemble(posts, Some(viewer)).await?))
}

// ─── Posts ───────────────────────────────────────────────────────────────────

pub async fn create_post(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Json(body): Json<ContentBody>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    validate_post_content(&body.content)?;
    let post = state.moderation.create_post(&me, body.content).await?;
    let view = state.feed.assemble_one(post, Some(&me)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_feed(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<PostView>>> {
    let posts = state.moderation.list_approved_feed(params.request()?).await?;
    view_page(&state, posts, &me).await
}

pub async fn list_pending(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<PostView>>> {
    let posts = state
        .moderation
        .list_pending_for_review(&me, params.request()?)
        .await?;
    view_page(&state, posts, &me).await
}

pub async fn list_mine(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<PostView>>> {
    let posts = state
        .moderation
        .list_by_author(AuthorSelector::Own(&me), params.request()?)
        .await?;
    view_page(&state, posts, &me).await
}

pub async fn list_by_author(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Query(params): Query<ByAuthorParams>,
) -> ApiResult<Json<Page<PostView>>> {
    let page = PageRequest::new(
        params.page.unwrap_or(0),
        params.size.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;
    let posts = state
        .moderation
        .list_by_author(AuthorSelector::Email(&params.email), page)
        .await?;
    view_page(&state, posts, &me).await
}

pub async fn get_post(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostView>> {
    let post = state
        .moderation
        .get_post(PostId(id))
        .await?
        .ok_or_else(|| AppError::not_found("post", id))?;
    Ok(Json(state.feed.assemble_one(post, Some(&me)).await?))
}

pub async fn edit_post(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(id): Path<i64>,
    Json(body): Json<ContentBody>,
) -> ApiResult<Json<PostView>> {
    validate_post_content(&body.content)?;
    let post = state.moderation.edit_post(&me, PostId(id), body.content).await?;
    Ok(Json(state.feed.assemble_one(post, Some(&me)).await?))
}

pub async fn set_status(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<PostView>> {
    let status: PostStatus = body.status.parse()?;
    let post = state.moderation.transition_status(&me, PostId(id), status).await?;
    state.metrics.record_decision(post.status);
    Ok(Json(state.feed.assemble_one(post, Some(&me)).await?))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.moderation.delete_post(&me, PostId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Inspires ────────────────────────────────────────────────────────────────

pub async fn like(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<Inspire>)> {
    let result = state.engagement.like(&me, PostId(id)).await;
    state.metrics.record_engagement("like", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

pub async fn unlike(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let result = state.engagement.unlike(&me, PostId(id)).await;
    state.metrics.record_engagement("unlike", &result);
    result?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub async fn list_notifications(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Path(recipient): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Notification>>> {
    let page = state
        .notifications
        .list_for_recipient(&me, UserId(recipient), params.request()?)
        .await?;
    Ok(Json(page))
}

pub async fn broadcast(
    State(state): State<AppState>,
    AuthIdentity(me): AuthIdentity,
    Json(body): Json<ContentBody>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let sent = state.notifications.broadcast(&me, body.content).await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

// ─── Operations ──────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_content_limits() {
        assert!(validate_post_content("hello").is_ok());
        assert!(validate_post_content("   ").is_err());
        assert!(validate_post_content(&"x".repeat(MAX_POST_LEN)).is_ok());
        assert!(validate_post_content(&"x".repeat(MAX_POST_LEN + 1)).is_err());
    }

    #[test]
    fn page_params_default_and_bound() {
        let defaults = PageParams { page: None, size: None };
        assert_eq!(defaults.request().unwrap(), PageRequest::new(0, DEFAULT_PAGE_SIZE).unwrap());

        let oversized = PageParams { page: Some(1), size: Some(1000) };
        assert!(matches!(oversized.request(), Err(AppError::Validation(_))));
    }
}

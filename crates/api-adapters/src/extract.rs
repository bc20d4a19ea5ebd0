//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domains::{AppError, Identity};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// The caller, verified from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Identity);

impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let Some(token) = header.strip_prefix("Bearer ") else {
            debug!("authorization header without bearer scheme");
            return Err(AppError::Unauthenticated.into());
        };

        let identity = state.identity.verify(token)?;
        Ok(AuthIdentity(identity))
    }
}

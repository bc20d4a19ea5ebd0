//! # services
//!
//! Orchestration layer of the feed core. Each service enforces role and
//! ownership rules, then delegates to the store ports defined in `domains`.
//! Services hold no locks and keep no state between calls.

pub mod engagement;
pub mod feed;
pub mod moderation;
pub mod notifications;

pub use engagement::EngagementService;
pub use feed::FeedAssembler;
pub use moderation::{AuthorSelector, ModerationService, APPROVAL_MESSAGE};
pub use notifications::{NotificationService, MAX_NOTIFICATION_LEN};

use domains::{AppError, Identity, StoreError};

/// Rejects non-admin callers with `Forbidden`.
pub(crate) fn require_admin(identity: &Identity, action: &str) -> domains::Result<()> {
    if identity.is_admin() {
        return Ok(());
    }
    tracing::warn!(user = %identity.subject, action, "admin role required");
    Err(AppError::Forbidden(format!("only admins may {action}")))
}

/// Translates a store failure into the caller-facing error kind.
///
/// Backend faults are logged here with their cause and surfaced as an
/// opaque [`AppError::Persistence`].
pub(crate) fn store_failure(operation: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |err| match err {
        StoreError::UniqueViolation(what) => AppError::Conflict(what),
        StoreError::MissingReference(what) => AppError::NotFound("referenced entity", what),
        StoreError::NotEligible(what) => AppError::InvalidOperation(what),
        StoreError::Backend(cause) => {
            tracing::error!(operation, error = ?cause, "store operation failed");
            AppError::Persistence(cause)
        }
    }
}

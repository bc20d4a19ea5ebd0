//! Shared handler state.

use std::sync::Arc;

use domains::{
    AvatarStore, IdentityProvider, InspireRepository, NotificationRepository, PostRepository,
    ProfileDirectory,
};
use services::{EngagementService, FeedAssembler, ModerationService, NotificationService};

use crate::metrics::Metrics;

/// State shared across all request handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<ModerationService>,
    pub engagement: Arc<EngagementService>,
    pub notifications: Arc<NotificationService>,
    pub feed: Arc<FeedAssembler>,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Arc<Metrics>,
}

/// The adapters the services are built from.
pub struct Ports {
    pub posts: Arc<dyn PostRepository>,
    pub inspires: Arc<dyn InspireRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub avatars: Arc<dyn AvatarStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(ports: Ports, metrics: Arc<Metrics>) -> Self {
        Self {
            moderation: Arc::new(ModerationService::new(
                ports.posts.clone(),
                ports.profiles.clone(),
            )),
            engagement: Arc::new(EngagementService::new(ports.posts, ports.inspires.clone())),
            notifications: Arc::new(NotificationService::new(ports.notifications)),
            feed: Arc::new(FeedAssembler::new(
                ports.inspires,
                ports.profiles,
                ports.avatars,
            )),
            identity: ports.identity,
            metrics,
        }
    }
}

//! Shared fixtures for the cross-crate tests: every service wired over one
//! in-memory store, plus two users and an admin with registered profiles.

use std::sync::Arc;

use domains::{Identity, Profile, Role, UserId};
use services::{EngagementService, FeedAssembler, ModerationService, NotificationService};
use storage_adapters::{InMemoryAvatars, InMemoryProfiles, InMemoryStore};

pub struct Harness {
    pub store: InMemoryStore,
    pub profiles: InMemoryProfiles,
    pub avatars: InMemoryAvatars,
    pub moderation: ModerationService,
    pub engagement: EngagementService,
    pub notifications: NotificationService,
    pub feed: FeedAssembler,
    pub u1: Identity,
    pub u2: Identity,
    pub admin: Identity,
}

pub fn identity(role: Role, email: &str) -> Identity {
    Identity {
        subject: UserId::new(),
        email: email.to_string(),
        role,
    }
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let profiles = InMemoryProfiles::new();
        let avatars = InMemoryAvatars::new();

        let u1 = identity(Role::User, "u1@example.com");
        let u2 = identity(Role::User, "u2@example.com");
        let admin = identity(Role::Admin, "admin@example.com");
        for (who, name) in [(&u1, "Una"), (&u2, "Ugo"), (&admin, "Ada")] {
            profiles.upsert(Profile {
                id: who.subject,
                name: name.to_string(),
                email: who.email.clone(),
            });
        }

        let posts = Arc::new(store.clone());
        Self {
            moderation: ModerationService::new(posts.clone(), Arc::new(profiles.clone())),
            engagement: EngagementService::new(posts, Arc::new(store.clone())),
            notifications: NotificationService::new(Arc::new(store.clone())),
            feed: FeedAssembler::new(
                Arc::new(store.clone()),
                Arc::new(profiles.clone()),
                Arc::new(avatars.clone()),
            ),
            store,
            profiles,
            avatars,
            u1,
            u2,
            admin,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

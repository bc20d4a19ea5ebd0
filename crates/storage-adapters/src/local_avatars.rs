//! Local filesystem implementation of `AvatarStore`.
//! Avatars are stored raw, one file per user, sharded by the first two hex
//! characters of the user id. The profile service owns uploads; this side
//! only reads.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use domains::{AvatarStore, UserId};
use tokio::fs;

pub struct LocalAvatarStore {
    /// Root directory for avatar files (e.g., "./data/avatars")
    root_path: PathBuf,
}

impl LocalAvatarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root_path: root.into() }
    }

    /// Generates a sharded path: "<root>/ab/ab12cd..."
    fn sharded_path(&self, user_id: UserId) -> PathBuf {
        let name = user_id.0.simple().to_string();
        let mut path = self.root_path.clone();
        path.push(&name[0..2]);
        path.push(name);
        path
    }
}

#[async_trait]
impl AvatarStore for LocalAvatarStore {
    async fn avatar(&self, user_id: UserId) -> anyhow::Result<Option<Bytes>> {
        match fs::read(self.sharded_path(user_id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

//! Saved-post persistence.
//!
//! Every operation is scoped by the owning user. Deletes check ownership
//! and remove in one step, so a caller can never delete another user's
//! record, even by guessing its id.

pub mod file;
pub mod journal;
pub mod remote;

use crate::identity::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use file::FileStore;
pub use remote::{RemoteAuth, RemoteStore};

pub type SavedPostId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPost {
    pub id: SavedPostId,
    pub owner: UserId,
    pub body: String,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The record exists but belongs to someone else. Nothing was removed.
    Forbidden,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected the caller's credentials")]
    Unauthorized,

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error("store data is corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

#[async_trait]
pub trait SavedPostStore: Send + Sync {
    async fn create_saved_post(
        &self,
        owner: &UserId,
        body: &str,
        rating: Option<u8>,
    ) -> Result<SavedPost, StoreError>;

    /// Newest first.
    async fn list_saved_posts(&self, owner: &UserId) -> Result<Vec<SavedPost>, StoreError>;

    async fn delete_saved_post(
        &self,
        owner: &UserId,
        id: SavedPostId,
    ) -> Result<DeleteOutcome, StoreError>;
}

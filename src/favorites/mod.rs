//! Client-side favorite reconciliation.
//!
//! [`FavoriteSyncEngine`] drives the generated-posts grid: toggles apply
//! immediately, then round-trip to the [`SavedPostStore`](crate::store::SavedPostStore)
//! and roll back if the store refuses. [`SavedFeed`] does the same for the
//! saved-posts page, with the ownership check done locally before any
//! delete is sent.

pub mod engine;
pub mod feed;
pub mod state;

pub use engine::{FavoriteSyncEngine, LocalPostId, PostView};
pub use feed::SavedFeed;
pub use state::FavoriteState;

use crate::store::{SavedPostId, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum FavoriteError {
    #[error("no post {0} in this session")]
    UnknownPost(LocalPostId),

    #[error("{0} already has an operation in flight")]
    OperationPending(String),

    #[error("saved post {0} does not belong to the current user")]
    Forbidden(SavedPostId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests;

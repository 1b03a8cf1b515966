use super::FavoriteError;
use crate::identity::UserId;
use crate::store::{DeleteOutcome, SavedPost, SavedPostId, SavedPostStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument, warn};

#[derive(Default)]
struct FeedState {
    posts: Vec<SavedPost>,
    in_flight: HashSet<SavedPostId>,
}

/// The saved-posts page for one user.
pub struct SavedFeed {
    owner: UserId,
    store: Arc<dyn SavedPostStore>,
    state: Mutex<FeedState>,
}

impl SavedFeed {
    pub fn new(owner: UserId, store: Arc<dyn SavedPostStore>) -> Self {
        Self {
            owner,
            store,
            state: Mutex::new(FeedState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn load(&self) -> Result<Vec<SavedPost>, FavoriteError> {
        let posts = self.store.list_saved_posts(&self.owner).await?;
        info!(owner = %self.owner, count = posts.len(), "saved posts loaded");
        self.state().posts = posts.clone();
        Ok(posts)
    }

    pub fn posts(&self) -> Vec<SavedPost> {
        self.state().posts.clone()
    }

    /// Deletes one saved post. Ids outside the loaded set are refused
    /// without contacting the store.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn delete(&self, id: SavedPostId) -> Result<(), FavoriteError> {
        let (index, removed) = {
            let mut state = self.state();
            if state.in_flight.contains(&id) {
                return Err(FavoriteError::OperationPending(format!("saved post {id}")));
            }
            let Some(index) = state.posts.iter().position(|p| p.id == id) else {
                warn!(id, "delete refused: id not in the caller's saved posts");
                return Err(FavoriteError::Forbidden(id));
            };
            state.in_flight.insert(id);
            (index, state.posts.remove(index))
        };

        let result = self.store.delete_saved_post(&self.owner, id).await;

        let mut state = self.state();
        state.in_flight.remove(&id);
        let failure = match result {
            Ok(DeleteOutcome::Deleted) => return Ok(()),
            Ok(DeleteOutcome::NotFound) => {
                warn!(id, "saved post already gone");
                return Ok(());
            }
            Ok(DeleteOutcome::Forbidden) => FavoriteError::Forbidden(id),
            Err(err) => FavoriteError::Store(err),
        };

        warn!(id, error = %failure, "delete failed, restoring post");
        let at = index.min(state.posts.len());
        state.posts.insert(at, removed);
        Err(failure)
    }
}

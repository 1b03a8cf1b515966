use super::{FavoriteError, FavoriteState};
use crate::gateway::GenerationRequest;
use crate::identity::UserId;
use crate::llm::Post;
use crate::store::{DeleteOutcome, SavedPostId, SavedPostStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument, warn};

pub type LocalPostId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostView {
    pub local_id: LocalPostId,
    pub post: Post,
    pub state: FavoriteState,
}

#[derive(Default)]
struct Session {
    posts: Vec<PostView>,
    /// Bumped by every `load_batch`.
    batch: u64,
    /// Confirmed favorites, oldest first. Outlives batch reloads.
    selections: Vec<(SavedPostId, String)>,
}

impl Session {
    fn find_mut(&mut self, id: LocalPostId) -> Option<&mut PostView> {
        self.posts.iter_mut().find(|p| p.local_id == id)
    }

    fn set_state(&mut self, id: LocalPostId, state: FavoriteState) {
        if let Some(view) = self.find_mut(id) {
            view.state = state;
        }
    }

    fn forget_selection(&mut self, saved_id: SavedPostId) {
        self.selections.retain(|(id, _)| *id != saved_id);
    }
}

enum Intent {
    Create { body: String, rating: u8 },
    Delete { saved_id: SavedPostId },
}

/// Optimistic favorite toggles for one user's generated posts.
///
/// The session lock is only held for state transitions, never across a
/// store call; a post in a pending state refuses further operations until
/// its call resolves.
pub struct FavoriteSyncEngine {
    owner: UserId,
    store: Arc<dyn SavedPostStore>,
    session: Mutex<Session>,
    next_local_id: AtomicU64,
}

impl FavoriteSyncEngine {
    pub fn new(owner: UserId, store: Arc<dyn SavedPostStore>) -> Self {
        Self {
            owner,
            store,
            session: Mutex::new(Session::default()),
            next_local_id: AtomicU64::new(1),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // a panic mid-transition leaves plain data behind, still usable
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the visible grid with a fresh batch. Returns the local ids
    /// in display order.
    pub fn load_batch(&self, posts: Vec<Post>) -> Vec<LocalPostId> {
        let views: Vec<PostView> = posts
            .into_iter()
            .map(|post| PostView {
                local_id: self.next_local_id.fetch_add(1, Ordering::Relaxed),
                post,
                state: FavoriteState::Unfavorited,
            })
            .collect();
        let ids = views.iter().map(|v| v.local_id).collect();
        let mut session = self.session();
        session.posts = views;
        session.batch += 1;
        ids
    }

    pub fn posts(&self) -> Vec<PostView> {
        self.session().posts.clone()
    }

    pub fn state_of(&self, id: LocalPostId) -> Option<FavoriteState> {
        self.session()
            .posts
            .iter()
            .find(|p| p.local_id == id)
            .map(|p| p.state)
    }

    pub fn prior_selections(&self) -> Vec<String> {
        self.session()
            .selections
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Next generation request, carrying this session's favorites as style
    /// exemplars.
    pub fn generation_request(&self, topic: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(topic).with_prior_selections(self.prior_selections())
    }

    /// Flips one post's favorite status and returns the settled state.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn toggle_favorite(&self, id: LocalPostId) -> Result<FavoriteState, FavoriteError> {
        let intent = {
            let mut session = self.session();
            let view = session.find_mut(id).ok_or(FavoriteError::UnknownPost(id))?;
            match view.state {
                FavoriteState::Unfavorited => {
                    view.state = FavoriteState::PendingCreate;
                    Intent::Create {
                        body: view.post.content.clone(),
                        rating: view.post.rating,
                    }
                }
                FavoriteState::Favorited { saved_id } => {
                    view.state = FavoriteState::PendingDelete { saved_id };
                    Intent::Delete { saved_id }
                }
                FavoriteState::PendingCreate | FavoriteState::PendingDelete { .. } => {
                    return Err(FavoriteError::OperationPending(format!("post {id}")));
                }
            }
        };

        match intent {
            Intent::Create { body, rating } => self.commit_create(id, body, rating).await,
            Intent::Delete { saved_id } => self.commit_delete(id, saved_id).await,
        }
    }

    async fn commit_create(
        &self,
        id: LocalPostId,
        body: String,
        rating: u8,
    ) -> Result<FavoriteState, FavoriteError> {
        let result = self
            .store
            .create_saved_post(&self.owner, &body, Some(rating))
            .await;

        let mut session = self.session();
        match result {
            Ok(saved) => {
                let state = FavoriteState::Favorited { saved_id: saved.id };
                session.set_state(id, state);
                session.selections.push((saved.id, body));
                debug!(local_id = id, saved_id = saved.id, "favorite saved");
                Ok(state)
            }
            Err(err) => {
                session.set_state(id, FavoriteState::Unfavorited);
                warn!(local_id = id, error = %err, "favorite failed, rolled back");
                Err(err.into())
            }
        }
    }

    async fn commit_delete(
        &self,
        id: LocalPostId,
        saved_id: SavedPostId,
    ) -> Result<FavoriteState, FavoriteError> {
        let result = self.store.delete_saved_post(&self.owner, saved_id).await;

        let mut session = self.session();
        match result {
            Ok(DeleteOutcome::Deleted) => {
                session.set_state(id, FavoriteState::Unfavorited);
                session.forget_selection(saved_id);
                Ok(FavoriteState::Unfavorited)
            }
            Ok(DeleteOutcome::NotFound) => {
                warn!(local_id = id, saved_id, "saved post already gone, treating as unfavorited");
                session.set_state(id, FavoriteState::Unfavorited);
                session.forget_selection(saved_id);
                Ok(FavoriteState::Unfavorited)
            }
            Ok(DeleteOutcome::Forbidden) => {
                session.set_state(id, FavoriteState::Favorited { saved_id });
                warn!(local_id = id, saved_id, "unfavorite refused by store, rolled back");
                Err(FavoriteError::Forbidden(saved_id))
            }
            Err(err) => {
                session.set_state(id, FavoriteState::Favorited { saved_id });
                warn!(local_id = id, error = %err, "unfavorite failed, rolled back");
                Err(err.into())
            }
        }
    }

    /// Removes a post from the grid. A favorited post is deleted from the
    /// store too, and put back at its old position if that fails.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn remove_post(&self, id: LocalPostId) -> Result<(), FavoriteError> {
        let (batch, index, view) = {
            let mut session = self.session();
            let index = session
                .posts
                .iter()
                .position(|p| p.local_id == id)
                .ok_or(FavoriteError::UnknownPost(id))?;
            if session.posts[index].state.is_pending() {
                return Err(FavoriteError::OperationPending(format!("post {id}")));
            }
            (session.batch, index, session.posts.remove(index))
        };

        let Some(saved_id) = view.state.saved_id() else {
            return Ok(());
        };

        let result = self.store.delete_saved_post(&self.owner, saved_id).await;

        let mut session = self.session();
        let failure = match result {
            Ok(DeleteOutcome::Deleted) | Ok(DeleteOutcome::NotFound) => {
                session.forget_selection(saved_id);
                return Ok(());
            }
            Ok(DeleteOutcome::Forbidden) => FavoriteError::Forbidden(saved_id),
            Err(err) => FavoriteError::Store(err),
        };

        if session.batch != batch {
            warn!(local_id = id, error = %failure, "remove failed after the grid was replaced");
            return Err(failure);
        }
        warn!(local_id = id, error = %failure, "remove failed, restoring post");
        let at = index.min(session.posts.len());
        session.posts.insert(at, view);
        Err(failure)
    }
}

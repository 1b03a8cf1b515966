use super::*;
use crate::identity::UserId;
use crate::llm::Post;
use crate::store::{DeleteOutcome, FileStore, SavedPost, SavedPostStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// In-memory store with failure switches and an optional gate that holds
/// every call until released.
#[derive(Default)]
struct FakeStore {
    rows: Mutex<Vec<SavedPost>>,
    next_id: AtomicI64,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    delete_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeStore {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn seed(&self, owner: &UserId, body: &str) -> SavedPost {
        let post = SavedPost {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            owner: owner.clone(),
            body: body.to_string(),
            rating: None,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(post.clone());
        post
    }

    fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl SavedPostStore for FakeStore {
    async fn create_saved_post(
        &self,
        owner: &UserId,
        body: &str,
        _rating: Option<u8>,
    ) -> Result<SavedPost, StoreError> {
        self.wait_gate().await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert timed out".into()));
        }
        Ok(self.seed(owner, body))
    }

    async fn list_saved_posts(&self, owner: &UserId) -> Result<Vec<SavedPost>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().rev().filter(|p| &p.owner == owner).cloned().collect())
    }

    async fn delete_saved_post(&self, owner: &UserId, id: i64) -> Result<DeleteOutcome, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete timed out".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        let Some(index) = rows.iter().position(|p| p.id == id) else {
            return Ok(DeleteOutcome::NotFound);
        };
        if &rows[index].owner != owner {
            return Ok(DeleteOutcome::Forbidden);
        }
        rows.remove(index);
        Ok(DeleteOutcome::Deleted)
    }
}

fn alice() -> UserId {
    UserId::parse("alice").unwrap()
}

fn bob() -> UserId {
    UserId::parse("bob").unwrap()
}

fn post(content: &str) -> Post {
    Post {
        content: content.to_string(),
        rating: 8,
    }
}

fn engine(store: Arc<FakeStore>) -> FavoriteSyncEngine {
    FavoriteSyncEngine::new(alice(), store)
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn failed_create_reverts_and_assigns_no_id() {
    let store = Arc::new(FakeStore::default());
    store.fail_create.store(true, Ordering::SeqCst);
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("Hook line.")]);

    let result = engine.toggle_favorite(ids[0]).await;

    assert!(matches!(result, Err(FavoriteError::Store(StoreError::Unavailable(_)))));
    let state = engine.state_of(ids[0]).unwrap();
    assert_eq!(state, FavoriteState::Unfavorited);
    assert_eq!(state.saved_id(), None);
    assert!(engine.prior_selections().is_empty());
    assert_eq!(store.row_count(), 0);
}

#[tokio::test]
async fn successful_create_binds_id_and_feeds_next_prompt() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("First."), post("Second.")]);

    let state = engine.toggle_favorite(ids[1]).await.unwrap();

    assert_eq!(state, FavoriteState::Favorited { saved_id: 1 });
    assert_eq!(engine.state_of(ids[0]), Some(FavoriteState::Unfavorited));
    assert_eq!(engine.prior_selections(), vec!["Second."]);

    let request = engine.generation_request("sleep hygiene");
    assert_eq!(request.topic, "sleep hygiene");
    assert_eq!(request.prior_selections, vec!["Second."]);
}

#[tokio::test]
async fn unfavorite_deletes_and_forgets_selection() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("Keep me?")]);

    engine.toggle_favorite(ids[0]).await.unwrap();
    let state = engine.toggle_favorite(ids[0]).await.unwrap();

    assert_eq!(state, FavoriteState::Unfavorited);
    assert_eq!(store.row_count(), 0);
    assert!(engine.prior_selections().is_empty());
}

#[tokio::test]
async fn failed_delete_rolls_back_to_favorited() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("Sticky.")]);
    engine.toggle_favorite(ids[0]).await.unwrap();

    store.fail_delete.store(true, Ordering::SeqCst);
    assert!(engine.toggle_favorite(ids[0]).await.is_err());

    assert_eq!(
        engine.state_of(ids[0]),
        Some(FavoriteState::Favorited { saved_id: 1 })
    );
    assert_eq!(engine.prior_selections(), vec!["Sticky."]);
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn record_gone_elsewhere_reconciles_to_unfavorited() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("Deleted in another tab.")]);
    engine.toggle_favorite(ids[0]).await.unwrap();

    store.rows.lock().unwrap().clear();

    assert_eq!(
        engine.toggle_favorite(ids[0]).await.unwrap(),
        FavoriteState::Unfavorited
    );
    assert!(engine.prior_selections().is_empty());
}

#[tokio::test]
async fn toggle_is_optimistic_and_second_toggle_is_rejected() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(FakeStore::gated(gate.clone()));
    let engine = Arc::new(engine(store.clone()));
    let ids = engine.load_batch(vec![post("Slow network.")]);
    let id = ids[0];

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.toggle_favorite(id).await }
    });

    wait_until(|| engine.state_of(id) == Some(FavoriteState::PendingCreate)).await;
    assert!(engine.state_of(id).unwrap().appears_favorited());

    assert!(matches!(
        engine.toggle_favorite(id).await,
        Err(FavoriteError::OperationPending(_))
    ));
    assert!(matches!(
        engine.remove_post(id).await,
        Err(FavoriteError::OperationPending(_))
    ));

    gate.notify_one();
    let settled = first.await.unwrap().unwrap();
    assert_eq!(settled, FavoriteState::Favorited { saved_id: 1 });
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn unknown_post_is_reported() {
    let engine = engine(Arc::new(FakeStore::default()));
    assert!(matches!(
        engine.toggle_favorite(99).await,
        Err(FavoriteError::UnknownPost(99))
    ));
}

#[tokio::test]
async fn removing_unfavorited_post_stays_local() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("a"), post("b")]);

    engine.remove_post(ids[0]).await.unwrap();

    assert_eq!(engine.posts().len(), 1);
    assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_remove_restores_post_in_place() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(store.clone());
    let ids = engine.load_batch(vec![post("a"), post("b"), post("c")]);
    engine.toggle_favorite(ids[1]).await.unwrap();

    store.fail_delete.store(true, Ordering::SeqCst);
    assert!(engine.remove_post(ids[1]).await.is_err());

    let order: Vec<_> = engine.posts().iter().map(|v| v.local_id).collect();
    assert_eq!(order, ids);
    assert_eq!(
        engine.state_of(ids[1]),
        Some(FavoriteState::Favorited { saved_id: 1 })
    );

    store.fail_delete.store(false, Ordering::SeqCst);
    engine.remove_post(ids[1]).await.unwrap();
    assert_eq!(engine.posts().len(), 2);
    assert_eq!(store.row_count(), 0);
}

#[tokio::test]
async fn failed_remove_does_not_leak_into_a_newer_batch() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(FakeStore::gated(gate.clone()));
    let engine = Arc::new(engine(store.clone()));
    let old = engine.load_batch(vec![post("a"), post("b")]);

    gate.notify_one();
    engine.toggle_favorite(old[0]).await.unwrap();

    store.fail_delete.store(true, Ordering::SeqCst);
    let removal = tokio::spawn({
        let engine = engine.clone();
        let id = old[0];
        async move { engine.remove_post(id).await }
    });
    wait_until(|| store.delete_calls.load(Ordering::SeqCst) == 1).await;

    let fresh = engine.load_batch(vec![post("x"), post("y"), post("z")]);
    gate.notify_one();
    assert!(removal.await.unwrap().is_err());

    let visible: Vec<_> = engine.posts().iter().map(|v| v.local_id).collect();
    assert_eq!(visible, fresh);
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn feed_refuses_ids_outside_own_set() {
    let store = Arc::new(FakeStore::default());
    store.seed(&alice(), "alice's post");
    let foreign = store.seed(&bob(), "bob's post");

    let feed = SavedFeed::new(alice(), store.clone());
    assert_eq!(feed.load().await.unwrap().len(), 1);

    assert!(matches!(
        feed.delete(foreign.id).await,
        Err(FavoriteError::Forbidden(id)) if id == foreign.id
    ));
    assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.row_count(), 2);
    assert_eq!(feed.posts().len(), 1);
}

#[tokio::test]
async fn feed_delete_is_optimistic_with_rollback() {
    let store = Arc::new(FakeStore::default());
    let first = store.seed(&alice(), "one");
    let second = store.seed(&alice(), "two");
    let feed = SavedFeed::new(alice(), store.clone());
    feed.load().await.unwrap();

    store.fail_delete.store(true, Ordering::SeqCst);
    assert!(feed.delete(first.id).await.is_err());
    let ids: Vec<_> = feed.posts().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    store.fail_delete.store(false, Ordering::SeqCst);
    feed.delete(first.id).await.unwrap();
    let ids: Vec<_> = feed.posts().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.id]);
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn feed_serialises_deletes_per_id() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(FakeStore::gated(gate.clone()));
    let post = store.seed(&alice(), "one");
    let feed = Arc::new(SavedFeed::new(alice(), store.clone()));
    feed.load().await.unwrap();

    let first = tokio::spawn({
        let feed = feed.clone();
        async move { feed.delete(post.id).await }
    });
    wait_until(|| feed.posts().is_empty()).await;

    assert!(matches!(
        feed.delete(post.id).await,
        Err(FavoriteError::OperationPending(_))
    ));

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(store.delete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn favorites_round_trip_through_durable_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let store: Arc<dyn SavedPostStore> =
        Arc::new(FileStore::open(&dir.path().join("saved_posts.log")).unwrap());

    let engine = FavoriteSyncEngine::new(alice(), store.clone());
    let ids = engine.load_batch(vec![post("Durable favorite.")]);
    engine.toggle_favorite(ids[0]).await.unwrap();

    let feed = SavedFeed::new(alice(), store);
    let saved = feed.load().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].body, "Durable favorite.");
    assert_eq!(saved[0].rating, Some(8));
}

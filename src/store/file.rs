use super::journal::{Record, RecordLog, StoredPost};
use super::{DeleteOutcome, SavedPost, SavedPostId, SavedPostStore, StoreError};
use crate::identity::UserId;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

struct Inner {
    log: RecordLog,
    posts: BTreeMap<SavedPostId, StoredPost>,
    next_id: SavedPostId,
}

/// Durable saved-post store on a local record journal.
pub struct FileStore {
    inner: Mutex<Inner>,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let (log, records) = RecordLog::open(path)?;

        let mut posts = BTreeMap::new();
        let mut next_id = 1;
        for record in records {
            match record {
                Record::Insert(post) => {
                    next_id = next_id.max(post.id + 1);
                    posts.insert(post.id, post);
                }
                Record::Delete { id } => {
                    next_id = next_id.max(id + 1);
                    posts.remove(&id);
                }
            }
        }

        info!(path = %path.display(), live = posts.len(), next_id, "saved-post store opened");
        Ok(Self {
            inner: Mutex::new(Inner {
                log,
                posts,
                next_id,
            }),
        })
    }

    /// Rewrites the journal with live records only.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut records: Vec<Record> = inner.posts.values().cloned().map(Record::Insert).collect();
        let live = records.len();
        // keep a marker so ids are never reused after the newest post was deleted
        let last_issued = inner.next_id - 1;
        if last_issued > 0 && !inner.posts.contains_key(&last_issued) {
            records.push(Record::Delete { id: last_issued });
        }
        inner.log.rewrite(&records)?;
        info!(live, "record journal compacted");
        Ok(live)
    }
}

fn to_saved_post(stored: &StoredPost) -> Result<SavedPost, StoreError> {
    let owner = UserId::parse(&stored.owner)
        .ok_or_else(|| StoreError::Corrupt(format!("bad owner on record {}", stored.id)))?;
    let created_at = Utc
        .timestamp_millis_opt(stored.created_at_ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("bad timestamp on record {}", stored.id)))?;
    Ok(SavedPost {
        id: stored.id,
        owner,
        body: stored.body.clone(),
        rating: stored.rating,
        created_at,
    })
}

#[async_trait]
impl SavedPostStore for FileStore {
    #[instrument(skip(self, body), fields(owner = %owner, body_len = body.len()))]
    async fn create_saved_post(
        &self,
        owner: &UserId,
        body: &str,
        rating: Option<u8>,
    ) -> Result<SavedPost, StoreError> {
        if body.trim().is_empty() {
            return Err(StoreError::Rejected("body must not be empty".to_string()));
        }

        let mut inner = self.inner.lock().await;
        let stored = StoredPost {
            id: inner.next_id,
            owner: owner.to_string(),
            body: body.to_string(),
            rating,
            created_at_ms: Utc::now().timestamp_millis(),
        };

        inner.log.append(&Record::Insert(stored.clone()))?;
        inner.next_id += 1;
        inner.posts.insert(stored.id, stored.clone());
        to_saved_post(&stored)
    }

    async fn list_saved_posts(&self, owner: &UserId) -> Result<Vec<SavedPost>, StoreError> {
        let inner = self.inner.lock().await;
        // ids grow with time, so reverse id order is newest first
        inner
            .posts
            .values()
            .rev()
            .filter(|p| p.owner == owner.as_str())
            .map(to_saved_post)
            .collect()
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn delete_saved_post(
        &self,
        owner: &UserId,
        id: SavedPostId,
    ) -> Result<DeleteOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.posts.get(&id) {
            None => return Ok(DeleteOutcome::NotFound),
            Some(post) if post.owner != owner.as_str() => {
                warn!(id, "delete refused: record belongs to another user");
                return Ok(DeleteOutcome::Forbidden);
            }
            Some(_) => {}
        }

        inner.log.append(&Record::Delete { id })?;
        inner.posts.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}

//! [`SavedPostStore`] spoken over the server's HTTP API.

use super::{DeleteOutcome, SavedPost, SavedPostId, SavedPostStore, StoreError};
use crate::identity::{UserId, FORWARDED_USER_HEADER};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// How the client proves who it is to the server.
#[derive(Clone)]
pub enum RemoteAuth {
    /// Sends the owner as `x-user-id`, for deployments behind an auth proxy.
    ForwardOwner,
    Bearer(String),
}

#[derive(Serialize)]
struct CreateBody<'a> {
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<u8>,
}

pub struct RemoteStore {
    client: Client,
    base_url: String,
    auth: RemoteAuth,
}

impl RemoteStore {
    pub fn new(base_url: &str, auth: RemoteAuth, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder, owner: &UserId) -> RequestBuilder {
        match &self.auth {
            RemoteAuth::ForwardOwner => request.header(FORWARDED_USER_HEADER, owner.as_str()),
            RemoteAuth::Bearer(token) => request.bearer_auth(token),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        request.send().await.map_err(|e| {
            warn!(error = %e, "saved-post request failed");
            StoreError::Unavailable(e.to_string())
        })
    }
}

fn unexpected(status: StatusCode) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED => StoreError::Unauthorized,
        s if s.is_server_error() => StoreError::Unavailable(format!("server answered {s}")),
        s => StoreError::Rejected(format!("server answered {s}")),
    }
}

#[async_trait]
impl SavedPostStore for RemoteStore {
    async fn create_saved_post(
        &self,
        owner: &UserId,
        body: &str,
        rating: Option<u8>,
    ) -> Result<SavedPost, StoreError> {
        let request = self
            .client
            .post(self.url("/api/saved-posts"))
            .json(&CreateBody { body, rating });
        let response = self.send(self.authorize(request, owner)).await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => response
                .json::<SavedPost>()
                .await
                .map_err(|e| StoreError::Corrupt(e.to_string())),
            status => Err(unexpected(status)),
        }
    }

    async fn list_saved_posts(&self, owner: &UserId) -> Result<Vec<SavedPost>, StoreError> {
        let request = self.client.get(self.url("/api/saved-posts"));
        let response = self.send(self.authorize(request, owner)).await?;

        match response.status() {
            StatusCode::OK => response
                .json::<Vec<SavedPost>>()
                .await
                .map_err(|e| StoreError::Corrupt(e.to_string())),
            status => Err(unexpected(status)),
        }
    }

    async fn delete_saved_post(
        &self,
        owner: &UserId,
        id: SavedPostId,
    ) -> Result<DeleteOutcome, StoreError> {
        let request = self.client.delete(self.url(&format!("/api/saved-posts/{id}")));
        let response = self.send(self.authorize(request, owner)).await?;

        let outcome = match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => DeleteOutcome::Deleted,
            StatusCode::NOT_FOUND => DeleteOutcome::NotFound,
            StatusCode::FORBIDDEN => DeleteOutcome::Forbidden,
            status => return Err(unexpected(status)),
        };
        debug!(id, ?outcome, "remote delete answered");
        Ok(outcome)
    }
}

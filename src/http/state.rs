use crate::error::AppError;
use crate::gateway::GenerationGateway;
use crate::identity::{IdentityProvider, UserId};
use crate::store::SavedPostStore;
use axum::http::HeaderMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GenerationGateway>,
    pub store: Arc<dyn SavedPostStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn identify(&self, headers: &HeaderMap) -> Option<UserId> {
        self.identity.current_identity(headers)
    }

    pub fn require_user(&self, headers: &HeaderMap) -> Result<UserId, AppError> {
        self.identify(headers).ok_or(AppError::Unauthorized)
    }
}

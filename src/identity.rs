//! Caller identity: who is asking, and is their session still valid.
//!
//! Sign-in itself happens upstream. This module only turns request
//! credentials into a stable [`UserId`].

use axum::http::{header::AUTHORIZATION, HeaderMap};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Header set by the fronting auth proxy in `forwarded` mode.
pub const FORWARDED_USER_HEADER: &str = "x-user-id";

fn user_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.:@|-]{1,128}$").ok())
        .as_ref()
}

/// Stable, opaque user identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        user_id_pattern()?
            .is_match(trimmed)
            .then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UserId::parse(&value).ok_or_else(|| format!("invalid user id: {value:?}"))
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Resolves the caller of a request. `None` means no valid session.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self, headers: &HeaderMap) -> Option<UserId>;
}

/// Trusts the user id forwarded by an authenticating reverse proxy.
#[derive(Debug, Default, Clone)]
pub struct ForwardedIdentity;

impl IdentityProvider for ForwardedIdentity {
    fn current_identity(&self, headers: &HeaderMap) -> Option<UserId> {
        let raw = headers.get(FORWARDED_USER_HEADER)?.to_str().ok()?;
        let id = UserId::parse(raw);
        if id.is_none() {
            debug!("rejecting malformed forwarded user id");
        }
        id
    }
}

/// Static bearer-token table, for deployments without a fronting proxy.
#[derive(Debug, Default, Clone)]
pub struct TokenIdentity {
    sessions: HashMap<String, UserId>,
}

impl TokenIdentity {
    pub fn new(tokens: &HashMap<String, String>) -> Self {
        let sessions = tokens
            .iter()
            .filter_map(|(token, user)| UserId::parse(user).map(|id| (token.clone(), id)))
            .collect();
        Self { sessions }
    }
}

impl IdentityProvider for TokenIdentity {
    fn current_identity(&self, headers: &HeaderMap) -> Option<UserId> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?.trim();
        self.sessions.get(token).cloned()
    }
}

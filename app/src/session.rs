//! In-memory login sessions for the gateway.
//!
//! Maps the session cookie value to the signed-in identity. Sessions are
//! ephemeral and lost on restart.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Session token (UUID stored in the cookie)
pub type SessionToken = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionToken, Identity>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `identity` under a fresh random token and returns the token.
    pub async fn create_session(&self, identity: Identity) -> SessionToken {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), identity);
        token
    }

    pub async fn identity(&self, token: &str) -> Option<Identity> {
        let sessions = self.sessions.read().await;
        sessions.get(token).cloned()
    }

    pub async fn destroy_session(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

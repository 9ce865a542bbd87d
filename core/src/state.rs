use crate::settings::{AppSettings, ResearchMode, SettingsPatch};
use crate::store::SnapshotStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const SESSIONS_KEY: &str = "sessions";
const SETTINGS_KEY: &str = "settings";
const DEFAULT_TITLE: &str = "New Chat";
const TITLE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Source {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_mode: Option<ResearchMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sources: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_data: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// The caller-supplied part of a message; the store stamps the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
}

impl NewMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn stamp(self) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            role: self.role,
            content: self.content,
            timestamp: Utc::now(),
            metadata: self.metadata,
        }
    }
}

/// The last research run of a session, kept for slide generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchContext {
    pub query: String,
    pub results: Value,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub search_engine: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub chat_id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_context: Option<ResearchContext>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            chat_id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            timestamp: Utc::now(),
            messages: Vec::new(),
            research_context: None,
        }
    }

    /// Appends a message. Returns true when the title changed, which only
    /// happens for the first user message of the session.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        let first_user = message.role == MessageRole::User
            && !self
                .messages
                .iter()
                .any(|existing| existing.role == MessageRole::User);
        if first_user {
            self.title = title_from(&message.content);
        }
        self.messages.push(message);
        self.timestamp = Utc::now();
        first_user
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub chat_id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub message_count: usize,
}

/// Serialized form of the session list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSessions {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
    #[serde(default)]
    pub current_session_id: Option<String>,
}

/// Single source of truth for chat sessions and app settings.
///
/// Cloning yields another handle onto the same state. Mutations never hold
/// the lock across an await point and never fail: persistence errors are
/// logged and the in-memory state stays authoritative.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<InnerState>>,
    store: SnapshotStore,
}

#[derive(Default)]
struct InnerState {
    user_id: Option<String>,
    sessions: Vec<ChatSession>,
    current_session: Option<String>,
    settings: AppSettings,
}

impl SessionStore {
    pub fn new(store: SnapshotStore) -> Self {
        let persisted: PersistedSessions = store
            .read::<PersistedSessions>(SESSIONS_KEY)
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "failed to load sessions, starting empty");
                None
            })
            .unwrap_or_default();
        let settings: AppSettings = store
            .read::<AppSettings>(SETTINGS_KEY)
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "failed to load settings, using defaults");
                None
            })
            .unwrap_or_default();
        let current_session = persisted
            .current_session_id
            .filter(|id| persisted.sessions.iter().any(|s| &s.chat_id == id));
        Self {
            inner: Arc::new(RwLock::new(InnerState {
                user_id: persisted.user_id,
                sessions: persisted.sessions,
                current_session,
                settings,
            })),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(SnapshotStore::in_memory())
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn create_session(&self) -> String {
        let mut inner = self.inner.write();
        let session = ChatSession::new();
        let id = session.chat_id.clone();
        inner.sessions.insert(0, session);
        inner.current_session = Some(id.clone());
        tracing::debug!(chat_id = %id, "created session");
        self.persist_sessions(&inner);
        id
    }

    pub fn load_session(&self, id: &str) -> Option<ChatSession> {
        let mut inner = self.inner.write();
        let session = inner.sessions.iter().find(|s| s.chat_id == id).cloned()?;
        inner.current_session = Some(session.chat_id.clone());
        self.persist_sessions(&inner);
        Some(session)
    }

    pub fn delete_session(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(position) = inner.sessions.iter().position(|s| s.chat_id == id) else {
            return false;
        };
        inner.sessions.remove(position);
        if inner.current_session.as_deref() == Some(id) {
            inner.current_session = inner.sessions.first().map(|s| s.chat_id.clone());
        }
        self.persist_sessions(&inner);
        true
    }

    /// Appends to the current session. `None` when there is no current session.
    pub fn add_message(&self, message: NewMessage) -> Option<ChatMessage> {
        let current = self.inner.read().current_session.clone()?;
        self.add_message_to(&current, message)
    }

    /// Appends to a specific session, e.g. when a response resolves after the
    /// user switched away from the session that sent the request.
    pub fn add_message_to(&self, chat_id: &str, message: NewMessage) -> Option<ChatMessage> {
        let mut inner = self.inner.write();
        let session = inner.sessions.iter_mut().find(|s| s.chat_id == chat_id)?;
        let stamped = message.stamp();
        if session.push(stamped.clone()) {
            tracing::debug!(chat_id, title = %session.title, "session titled");
        }
        self.persist_sessions(&inner);
        Some(stamped)
    }

    pub fn ensure_session(&self) -> String {
        if let Some(id) = self.current_session_id() {
            return id;
        }
        self.create_session()
    }

    pub fn rename_session(&self, id: &str, title: impl Into<String>) -> bool {
        let mut inner = self.inner.write();
        let Some(session) = inner.sessions.iter_mut().find(|s| s.chat_id == id) else {
            return false;
        };
        session.title = title.into();
        self.persist_sessions(&inner);
        true
    }

    pub fn set_research_context(&self, id: &str, context: ResearchContext) -> bool {
        let mut inner = self.inner.write();
        let Some(session) = inner.sessions.iter_mut().find(|s| s.chat_id == id) else {
            return false;
        };
        session.research_context = Some(context);
        self.persist_sessions(&inner);
        true
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> AppSettings {
        let mut inner = self.inner.write();
        inner.settings.apply(patch);
        if let Err(err) = self.store.write(SETTINGS_KEY, &inner.settings) {
            tracing::warn!(%err, "failed to persist settings");
        }
        inner.settings.clone()
    }

    /// Records the signed-in user. Sessions belonging to a different user are
    /// wiped so they never leak across accounts.
    pub fn set_user_id(&self, user_id: Option<String>) {
        let mut inner = self.inner.write();
        if inner.user_id == user_id {
            return;
        }
        let switching = inner.user_id.is_some() && user_id.is_some();
        if switching {
            tracing::info!("signed-in user changed, clearing sessions");
            inner.sessions.clear();
            inner.current_session = None;
        }
        inner.user_id = user_id;
        self.persist_sessions(&inner);
    }

    /// Logout: drops every session and the user id. Settings survive.
    pub fn clear_user_data(&self) {
        let mut inner = self.inner.write();
        inner.user_id = None;
        inner.sessions.clear();
        inner.current_session = None;
        self.persist_sessions(&inner);
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.read().user_id.clone()
    }

    pub fn settings(&self) -> AppSettings {
        self.inner.read().settings.clone()
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.inner.read().current_session.clone()
    }

    pub fn current_session(&self) -> Option<ChatSession> {
        let inner = self.inner.read();
        let id = inner.current_session.as_deref()?;
        inner.sessions.iter().find(|s| s.chat_id == id).cloned()
    }

    pub fn session(&self, id: &str) -> Option<ChatSession> {
        self.inner
            .read()
            .sessions
            .iter()
            .find(|s| s.chat_id == id)
            .cloned()
    }

    pub fn session_summaries(&self) -> Vec<SessionSummary> {
        self.inner
            .read()
            .sessions
            .iter()
            .map(|s| SessionSummary {
                chat_id: s.chat_id.clone(),
                title: s.title.clone(),
                timestamp: s.timestamp,
                message_count: s.messages.len(),
            })
            .collect()
    }

    fn persist_sessions(&self, inner: &InnerState) {
        let snapshot = PersistedSessions {
            user_id: inner.user_id.clone(),
            sessions: inner.sessions.clone(),
            current_session_id: inner.current_session.clone(),
        };
        if let Err(err) = self.store.write(SESSIONS_KEY, &snapshot) {
            tracing::warn!(%err, "failed to persist sessions");
        }
    }
}

fn title_from(content: &str) -> String {
    let trimmed = content.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(TITLE_LIMIT).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

use crate::client::{BackendApi, ChatRequest, HistoryEntry, ResearchReport, ResearchRequest};
use crate::error::ApiError;
use crate::notice::Notifier;
use crate::settings::ResearchMode;
use crate::state::{
    ChatMessage, MessageMetadata, MessageRole, NewMessage, ResearchContext, SessionStore,
};
use chrono::Utc;
use std::sync::Arc;

/// Assistant reply appended when a chat request fails.
pub const CHAT_FALLBACK: &str =
    "Sorry, something went wrong while contacting the assistant. Please try again.";
pub const RESEARCH_FALLBACK: &str =
    "Sorry, the research request failed. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchOptions {
    pub days_back: u32,
    pub effort: String,
    pub scope: String,
    pub use_hybrid_search: bool,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            days_back: 7,
            effort: "standard".to_string(),
            scope: "balanced".to_string(),
            use_hybrid_search: true,
        }
    }
}

/// Drives a conversation: appends to the session store, calls the backend and
/// records the reply (or a fallback) on the session that asked.
pub struct ChatController {
    sessions: SessionStore,
    api: Arc<dyn BackendApi>,
    notifier: Notifier,
    user_name: Option<String>,
}

impl ChatController {
    pub fn new(sessions: SessionStore, api: Arc<dyn BackendApi>, notifier: Notifier) -> Self {
        Self {
            sessions,
            api,
            notifier,
            user_name: None,
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Sends `content` as a user message and returns the assistant reply that
    /// was appended. Blank input is ignored.
    pub async fn send_message(&self, content: &str) -> Option<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let chat_id = self.sessions.ensure_session();
        let history = self
            .sessions
            .session(&chat_id)
            .map(|session| history_of(&session.messages))
            .unwrap_or_default();
        self.sessions
            .add_message_to(&chat_id, NewMessage::user(content))?;

        let settings = self.sessions.settings();
        let request = ChatRequest {
            message: content.to_string(),
            chat_history: history,
            chat_id: chat_id.clone(),
            user_id: self.sessions.user_id(),
            user_name: self.user_name.clone(),
            deep_research_mode: settings.deep_research_mode,
            realtime_research_mode: settings.realtime_research_mode,
            agent_mode: settings.agent_mode,
            model: settings.selected_model.clone(),
            search_engine: settings.search_engine.clone(),
        };

        match self.api.chat(&request).await {
            Ok(response) => {
                tracing::debug!(%chat_id, sources = response.sources.len(), "chat reply received");
                let metadata = MessageMetadata {
                    research_mode: Some(settings.research_mode()),
                    model: response.model.or(Some(settings.selected_model)),
                    total_sources: response.total_sources.or(Some(response.sources.len())),
                    sources: response.sources,
                    research_data: response.research_data,
                    is_error: false,
                };
                self.sessions.add_message_to(
                    &chat_id,
                    NewMessage::assistant(response.response).with_metadata(metadata),
                )
            }
            Err(err) => self.fail(&chat_id, "chat request failed", err, CHAT_FALLBACK),
        }
    }

    /// Runs a research job for `topic` and records it as the session's
    /// research context.
    pub async fn run_research(
        &self,
        topic: &str,
        options: ResearchOptions,
    ) -> Option<ResearchReport> {
        let topic = topic.trim();
        if topic.is_empty() {
            return None;
        }
        let chat_id = self.sessions.ensure_session();
        self.sessions
            .add_message_to(&chat_id, NewMessage::user(topic))?;

        let settings = self.sessions.settings();
        let request = ResearchRequest {
            topic: topic.to_string(),
            user_id: self.sessions.user_id(),
            user_name: self.user_name.clone(),
            days_back: options.days_back,
            effort: options.effort,
            scope: options.scope,
            model: settings.selected_model.clone(),
            chat_id: chat_id.clone(),
            search_engine: settings.search_engine.clone(),
            use_hybrid_search: options.use_hybrid_search,
        };

        match self.api.research(&request).await {
            Ok(report) => {
                let results = serde_json::to_value(&report).unwrap_or_default();
                self.sessions.set_research_context(
                    &chat_id,
                    ResearchContext {
                        query: topic.to_string(),
                        results: results.clone(),
                        timestamp: Utc::now(),
                        model: settings.selected_model.clone(),
                        search_engine: settings.search_engine.clone(),
                    },
                );
                let metadata = MessageMetadata {
                    research_mode: Some(ResearchMode::DeepResearch),
                    model: Some(settings.selected_model),
                    sources: report.sources.clone(),
                    total_sources: Some(report.sources.len()),
                    research_data: Some(results),
                    is_error: false,
                };
                self.sessions.add_message_to(
                    &chat_id,
                    NewMessage::assistant(research_summary(&report)).with_metadata(metadata),
                );
                self.notifier.success("Research complete");
                Some(report)
            }
            Err(err) => {
                self.fail(&chat_id, "research request failed", err, RESEARCH_FALLBACK);
                None
            }
        }
    }

    fn fail(
        &self,
        chat_id: &str,
        context: &'static str,
        err: ApiError,
        fallback: &str,
    ) -> Option<ChatMessage> {
        tracing::error!(%err, chat_id, "{context}");
        self.notifier.error(err.user_message());
        let metadata = MessageMetadata {
            is_error: true,
            ..MessageMetadata::default()
        };
        self.sessions
            .add_message_to(chat_id, NewMessage::assistant(fallback).with_metadata(metadata))
    }
}

fn history_of(messages: &[ChatMessage]) -> Vec<HistoryEntry> {
    messages
        .iter()
        .filter(|message| !message.metadata.as_ref().is_some_and(|m| m.is_error))
        .map(|message| HistoryEntry {
            role: match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::System => "system",
            }
            .to_string(),
            content: message.content.clone(),
        })
        .collect()
}

fn research_summary(report: &ResearchReport) -> String {
    let mut text = report.executive_summary.trim().to_string();
    let findings = report.finding_lines();
    if !findings.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str("Key findings:\n");
        for finding in findings {
            text.push_str("- ");
            text.push_str(&finding);
            text.push('\n');
        }
    }
    text.trim_end().to_string()
}

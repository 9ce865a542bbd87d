pub mod admin;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod notice;
pub mod settings;
pub mod slides;
pub mod state;
pub mod store;
pub mod stream;
pub mod telemetry;

pub use admin::{AccessState, AdminGate};
pub use chat::{ChatController, ResearchOptions};
pub use client::{ApiClient, BackendApi, ByteStream, SESSION_COOKIE};
pub use config::{BackendSettings, ConfigError};
pub use error::ApiError;
pub use generation::{consume_stream, GenerationStep, PresentationWorkspace, StreamOutcome};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use settings::{AppSettings, ResearchMode, SettingsPatch, ThemeMode};
pub use slides::{Outline, Presentation, Slide, SlideKind};
pub use state::{ChatMessage, ChatSession, MessageRole, NewMessage, SessionStore};
pub use store::SnapshotStore;
pub use stream::{SseDecoder, StreamEvent};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A toast shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Sending half of the toast channel. Notices sent after the receiver is
/// dropped are discarded.
#[derive(Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notice>,
}

impl Notifier {
    pub fn new() -> (Self, UnboundedReceiver<Notice>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// A notifier nobody listens to.
    pub fn detached() -> Self {
        Self::new().0
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Error, message.into());
    }

    fn send(&self, level: NoticeLevel, message: String) {
        self.tx.send(Notice { level, message }).ok();
    }
}

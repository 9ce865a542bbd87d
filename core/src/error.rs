use serde::Deserialize;

/// Failures surfaced by calls through the gateway.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Text suitable for a toast notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(err) if err.is_connect() || err.is_timeout() => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Transport(_) => "The request could not be completed.".to_string(),
            Self::Status { status: 401, .. } => "Your session has expired. Sign in again.".to_string(),
            Self::Status { message, .. } => message.clone(),
            Self::Decode(_) => "The server sent a response that could not be read.".to_string(),
            Self::Stream(detail) => format!("Generation was interrupted: {detail}"),
            Self::InvalidUrl(_) => "The client is misconfigured.".to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Builds a status error from a non-2xx body, understanding both the
    /// gateway envelope (`{error, details}`) and FastAPI's `{detail}`.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed
                .error
                .or(parsed.detail.map(|detail| match detail {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                }))
                .or(parsed.message)
                .unwrap_or_else(|| format!("HTTP {status}")),
            Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
            Err(_) => body.trim().to_string(),
        };
        Self::Status { status, message }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

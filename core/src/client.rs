use crate::error::ApiError;
use crate::slides::{Outline, Presentation};
use crate::state::{ResearchContext, Source};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Name of the cookie the gateway reads the session token from.
pub const SESSION_COOKIE: &str = "deepdesk_session";

/// Raw response body chunks of a streaming endpoint.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub chat_history: Vec<HistoryEntry>,
    pub chat_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub deep_research_mode: bool,
    pub realtime_research_mode: bool,
    pub agent_mode: bool,
    pub model: String,
    pub search_engine: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub total_sources: Option<usize>,
    #[serde(default)]
    pub research_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchRequest {
    pub topic: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub days_back: u32,
    pub effort: String,
    pub scope: String,
    pub model: String,
    pub chat_id: String,
    pub search_engine: String,
    pub use_hybrid_search: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchReport {
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub key_findings: Vec<Value>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResearchReport {
    /// Findings rendered as text, whatever shape the backend used.
    pub fn finding_lines(&self) -> Vec<String> {
        self.key_findings
            .iter()
            .map(|finding| match finding {
                Value::String(text) => text.clone(),
                Value::Object(fields) => fields
                    .get("finding")
                    .or_else(|| fields.get("title"))
                    .or_else(|| fields.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| finding.to_string()),
                other => other.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentationGenerateRequest {
    pub topic: String,
    pub user_id: Option<String>,
    pub slide_count: u32,
    pub style: String,
    pub aspect_ratio: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pptx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pptx => "pptx",
            Self::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentationExportRequest {
    pub presentation: Presentation,
    pub user_id: Option<String>,
    pub format: ExportFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Research text sent with a slide request is capped at this many characters.
pub const RESEARCH_CONTEXT_LIMIT: usize = 5000;

/// Body of the direct streaming endpoint. Also carries the settings the
/// outline flow reuses for its two requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZStyleRequest {
    pub topic: String,
    pub slide_count: u32,
    pub theme: String,
    /// Only the outline endpoint reads this.
    #[serde(default = "default_outline_style", skip_serializing)]
    pub style: String,
    pub model: String,
    pub user_id: Option<String>,
    pub generate_images: bool,
    pub use_research: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_context: Option<String>,
}

fn default_outline_style() -> String {
    "professional".to_string()
}

impl ZStyleRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            slide_count: 8,
            theme: "dark".to_string(),
            style: default_outline_style(),
            model: "glm-7step".to_string(),
            user_id: None,
            generate_images: true,
            use_research: true,
            research_context: None,
        }
    }

    /// Attaches a session's research run as plain text.
    pub fn with_research(mut self, context: &ResearchContext) -> Self {
        self.research_context = Some(research_text(context));
        self
    }

    pub fn outline_request(&self) -> OutlineRequest {
        OutlineRequest {
            topic: self.topic.clone(),
            slide_count: self.slide_count,
            style: self.style.clone(),
            model: self.model.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// Body of `/api/zstyle/outline`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlineRequest {
    pub topic: String,
    pub slide_count: u32,
    pub style: String,
    pub model: String,
    pub user_id: Option<String>,
}

fn research_text(context: &ResearchContext) -> String {
    let mut text = format!("Research: {}\n", context.query);
    match &context.results {
        Value::String(body) => text.push_str(body),
        Value::Object(fields) => {
            if let Some(summary) = fields.get("executive_summary").and_then(Value::as_str) {
                text.push_str(summary);
                text.push('\n');
            }
            match fields.get("key_findings").and_then(Value::as_array) {
                Some(findings) => {
                    for finding in findings {
                        let line = match finding {
                            Value::String(line) => line.clone(),
                            other => other.to_string(),
                        };
                        text.push_str("- ");
                        text.push_str(&line);
                        text.push('\n');
                    }
                }
                None if !fields.contains_key("executive_summary") => {
                    text.push_str(&context.results.to_string());
                }
                None => {}
            }
        }
        Value::Null => {}
        other => text.push_str(&other.to_string()),
    }
    match text.char_indices().nth(RESEARCH_CONTEXT_LIMIT) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavePresentationRequest {
    pub title: String,
    pub user_id: Option<String>,
    pub slides: Vec<crate::slides::Slide>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminCheck {
    pub is_admin: bool,
    #[serde(default)]
    pub email: Option<String>,
}

/// Pulls the outline out of the `/api/zstyle/outline` response.
///
/// The backend nests it under `data`; some builds use `outline` or return it
/// bare. A response without any outline entries is rejected.
pub fn outline_from_response(mut value: Value) -> Result<Outline, ApiError> {
    let nested = ["data", "outline"]
        .into_iter()
        .find_map(|key| value.get_mut(key).filter(|inner| inner.is_object()).map(Value::take));
    let outline: Outline = serde_json::from_value(nested.unwrap_or(value))?;
    if outline.outline.is_empty() {
        return Err(ApiError::Decode(serde::de::Error::custom(
            "outline response has no slides",
        )));
    }
    Ok(outline)
}

#[derive(Deserialize)]
struct PresentationList {
    #[serde(default)]
    presentations: Vec<Presentation>,
}

/// Everything the client state machines need from the gateway.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
    async fn research(&self, request: &ResearchRequest) -> Result<ResearchReport, ApiError>;
    async fn generate_presentation(
        &self,
        request: &PresentationGenerateRequest,
    ) -> Result<Presentation, ApiError>;
    async fn export_presentation(
        &self,
        request: &PresentationExportRequest,
    ) -> Result<ExportedFile, ApiError>;
    async fn list_presentations(&self) -> Result<Vec<Presentation>, ApiError>;
    async fn save_presentation(&self, request: &SavePresentationRequest) -> Result<Value, ApiError>;
    async fn delete_presentation(&self, id: &str) -> Result<(), ApiError>;
    async fn zstyle_outline(&self, request: &OutlineRequest) -> Result<Outline, ApiError>;
    /// Opens a streaming endpoint and returns the raw body chunks.
    async fn open_stream(&self, path: &str, body: &Value) -> Result<ByteStream, ApiError>;
    async fn admin_check(&self) -> Result<AdminCheck, ApiError>;
}

/// reqwest client for the gateway, carrying the session token as a cookie.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Option<(String, String)>,
}

impl ApiClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            session: None,
        }
    }

    /// Sends `token` in the default [`SESSION_COOKIE`].
    pub fn with_session(self, token: impl Into<String>) -> Self {
        self.with_session_cookie(SESSION_COOKIE, token)
    }

    /// Sends `token` in a cookie named to match the gateway's `cookie_name`.
    pub fn with_session_cookie(mut self, name: impl Into<String>, token: impl Into<String>) -> Self {
        self.session = Some((name.into(), token.into()));
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut builder = self.http.request(method, self.url(path)?);
        if let Some((name, token)) = &self.session {
            builder = builder.header(COOKIE, format!("{name}={token}"));
        }
        Ok(builder)
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), "gateway returned an error");
        Err(ApiError::from_body(status.as_u16(), &body))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = Self::send(self.request(reqwest::Method::POST, path)?.json(body)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = Self::send(self.request(reqwest::Method::GET, path)?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BackendApi for ApiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.post_json("/api/chat", request).await
    }

    async fn research(&self, request: &ResearchRequest) -> Result<ResearchReport, ApiError> {
        self.post_json("/api/research", request).await
    }

    async fn generate_presentation(
        &self,
        request: &PresentationGenerateRequest,
    ) -> Result<Presentation, ApiError> {
        self.post_json("/api/presentations/generate", request).await
    }

    async fn export_presentation(
        &self,
        request: &PresentationExportRequest,
    ) -> Result<ExportedFile, ApiError> {
        let builder = self
            .request(reqwest::Method::POST, "/api/presentations/export")?
            .json(request);
        let response = Self::send(builder).await?;
        let headers = response.headers().clone();
        let bytes = response.bytes().await?.to_vec();
        let fallback = format!(
            "{}.{}",
            safe_file_stem(&request.presentation.title),
            request.format.extension()
        );
        Ok(ExportedFile {
            filename: attachment_filename(&headers).unwrap_or(fallback),
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            bytes,
        })
    }

    async fn list_presentations(&self) -> Result<Vec<Presentation>, ApiError> {
        let list: PresentationList = self.get_json("/api/presentations").await?;
        Ok(list.presentations)
    }

    async fn save_presentation(&self, request: &SavePresentationRequest) -> Result<Value, ApiError> {
        self.post_json("/api/presentations/save", request).await
    }

    async fn delete_presentation(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/api/presentations/{id}");
        Self::send(self.request(reqwest::Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn zstyle_outline(&self, request: &OutlineRequest) -> Result<Outline, ApiError> {
        let value: Value = self.post_json("/api/zstyle/outline", request).await?;
        outline_from_response(value)
    }

    async fn open_stream(&self, path: &str, body: &Value) -> Result<ByteStream, ApiError> {
        let response = Self::send(self.request(reqwest::Method::POST, path)?.json(body)).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from));
        Ok(stream.boxed())
    }

    async fn admin_check(&self) -> Result<AdminCheck, ApiError> {
        self.get_json("/api/admin/check").await
    }
}

/// Extracts `filename` from an `attachment` Content-Disposition header.
pub fn attachment_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    value.split(';').map(str::trim).find_map(|part| {
        let name = part
            .strip_prefix("filename=")
            .or_else(|| part.strip_prefix("filename*=UTF-8''"))?;
        let name = name.trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

fn safe_file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' { ch } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "presentation".to_string()
    } else {
        stem
    }
}

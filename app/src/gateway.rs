//! Forwarding from gateway routes to the research backend.
//!
//! Every proxied route goes through [`Gateway::forward`]; the route table in
//! `routes` only decides which credential and response handling to use.

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use deepdesk_core::BackendSettings;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// How the gateway authenticates itself to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer,
    UserEmail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Binary,
    Stream,
}

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Appended to the query as `user_id=<email>`.
    pub user_id: Option<String>,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
    pub credential: Credential,
    pub kind: ResponseKind,
}

/// `{error, details?}` body returned for every gateway-originated failure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    settings: Arc<BackendSettings>,
}

impl Gateway {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Backend base URL followed by the incoming path and query.
    pub fn target_url(&self, path: &str, query: Option<&str>, user_id: Option<&str>) -> Result<Url, url::ParseError> {
        let base = self.settings.api_url.as_str().trim_end_matches('/');
        let mut raw = format!("{base}{path}");
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            raw.push('?');
            raw.push_str(query);
        }
        let mut url = Url::parse(&raw)?;
        if let Some(user_id) = user_id {
            url.query_pairs_mut().append_pair("user_id", user_id);
        }
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder, credential: &Credential) -> reqwest::RequestBuilder {
        match credential {
            Credential::Bearer => builder.bearer_auth(&self.settings.backend_api_secret),
            Credential::UserEmail(email) => builder.header(USER_EMAIL_HEADER, email),
        }
    }

    pub async fn forward(&self, request: ForwardRequest) -> Response {
        let url = match self.target_url(
            &request.path,
            request.query.as_deref(),
            request.user_id.as_deref(),
        ) {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(%err, path = %request.path, "invalid backend url");
                return ErrorEnvelope::new("Invalid backend URL")
                    .with_details(err.to_string())
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let mut builder = self.http.request(request.method.clone(), url);
        builder = self.authorize(builder, &request.credential);
        if request.method != Method::GET && request.method != Method::HEAD {
            if let Some(content_type) = &request.content_type {
                builder = builder.header(CONTENT_TYPE, content_type.clone());
            }
            builder = builder.body(request.body.clone());
        }

        tracing::debug!(method = %request.method, path = %request.path, kind = ?request.kind, "forwarding");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, path = %request.path, "backend unreachable");
                return ErrorEnvelope::new("Failed to reach backend")
                    .with_details(err.to_string())
                    .into_response_with(StatusCode::BAD_GATEWAY);
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::info!(status = status.as_u16(), path = %request.path, "backend returned an error");
            return relay_error(status, response).await;
        }

        match request.kind {
            ResponseKind::Json => relay_json(status, response).await,
            ResponseKind::Binary => relay_binary(status, response).await,
            ResponseKind::Stream => relay_stream(status, response),
        }
    }

    /// Asks the backend whether `email` may use the admin endpoints.
    pub async fn probe_admin(&self, email: &str) -> Response {
        let url = match self.target_url("/api/admin/stats", None, None) {
            Ok(url) => url,
            Err(err) => {
                return ErrorEnvelope::new("Invalid backend URL")
                    .with_details(err.to_string())
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        let builder = self.authorize(self.http.get(url), &Credential::UserEmail(email.to_string()));
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, "admin probe failed");
                return ErrorEnvelope::new("Failed to reach backend")
                    .with_details(err.to_string())
                    .into_response_with(StatusCode::BAD_GATEWAY);
            }
        };
        let status = response.status();
        if status.is_success() {
            Json(json!({"is_admin": true, "email": email})).into_response()
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Json(json!({"is_admin": false, "email": email})).into_response()
        } else {
            relay_error(status, response).await
        }
    }
}

async fn relay_error(status: StatusCode, response: reqwest::Response) -> Response {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => (status, Json(body)).into_response(),
        Err(_) => ErrorEnvelope::new("Backend request failed")
            .with_details(text)
            .into_response_with(status),
    }
}

async fn relay_json(status: StatusCode, response: reqwest::Response) -> Response {
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ErrorEnvelope::new("Failed to reach backend")
                .with_details(err.to_string())
                .into_response_with(StatusCode::BAD_GATEWAY)
        }
    };
    if bytes.is_empty() {
        return status.into_response();
    }
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => {
            tracing::warn!(%err, "backend returned a non-JSON success body");
            ErrorEnvelope::new("Invalid response format from backend")
                .with_details(err.to_string())
                .into_response_with(StatusCode::BAD_GATEWAY)
        }
    }
}

async fn relay_binary(status: StatusCode, response: reqwest::Response) -> Response {
    let mut headers = HeaderMap::new();
    for name in [CONTENT_TYPE, CONTENT_DISPOSITION] {
        if let Some(value) = response.headers().get(&name) {
            headers.insert(name, value.clone());
        }
    }
    match response.bytes().await {
        Ok(bytes) => (status, headers, bytes).into_response(),
        Err(err) => ErrorEnvelope::new("Failed to reach backend")
            .with_details(err.to_string())
            .into_response_with(StatusCode::BAD_GATEWAY),
    }
}

fn relay_stream(status: StatusCode, response: reqwest::Response) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    (status, headers, Body::from_stream(response.bytes_stream())).into_response()
}

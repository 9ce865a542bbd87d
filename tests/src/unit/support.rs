use async_trait::async_trait;
use deepdesk_core::client::{
    AdminCheck, BackendApi, ByteStream, ChatRequest, ChatResponse, ExportedFile, OutlineRequest,
    PresentationExportRequest, PresentationGenerateRequest, ResearchReport, ResearchRequest,
    SavePresentationRequest,
};
use deepdesk_core::slides::{Outline, OutlineEntry, Presentation};
use deepdesk_core::ApiError;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Mutex;

/// Backend double driven by canned answers. Records the requests it saw.
#[derive(Default)]
pub struct ScriptedBackend {
    pub fail_with: Option<u16>,
    pub stream_records: Vec<String>,
    /// Keep the stream open after the canned records.
    pub hang: bool,
    pub is_admin: bool,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub outline_requests: Mutex<Vec<OutlineRequest>>,
    pub stream_bodies: Mutex<Vec<(String, Value)>>,
}

impl ScriptedBackend {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    pub fn streaming(records: &[&str]) -> Self {
        Self {
            stream_records: records.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        match self.fail_with {
            Some(status) => Err(ApiError::from_body(
                status,
                "{\"error\":\"Backend request failed\",\"details\":\"boom\"}",
            )),
            None => Ok(()),
        }
    }
}

pub fn outline() -> Outline {
    Outline {
        title: "Solar Power".into(),
        outline: vec![
            OutlineEntry {
                slide_number: 1,
                slide_type: "title".into(),
                title: "Solar Power".into(),
                key_message: None,
            },
            OutlineEntry {
                slide_number: 2,
                slide_type: "stats".into(),
                title: "Growth".into(),
                key_message: Some("Capacity doubled".into()),
            },
        ],
        style: None,
    }
}

pub fn slide_record(number: u32, title: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"type": "slide", "slide_number": number, "slide": {"type": "content", "title": title}})
    )
}

#[async_trait]
impl BackendApi for ScriptedBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        self.check()?;
        Ok(serde_json::from_value(json!({
            "response": format!("echo: {}", request.message),
            "mode": "standard",
            "model": request.model,
            "sources": [{"title": "Doc", "url": "https://example.com/doc"}]
        }))?)
    }

    async fn research(&self, _request: &ResearchRequest) -> Result<ResearchReport, ApiError> {
        self.check()?;
        Ok(serde_json::from_value(json!({
            "executive_summary": "Solar is growing.",
            "key_findings": ["Costs fell"],
            "sources": [{"title": "IEA", "url": "https://iea.org"}]
        }))?)
    }

    async fn generate_presentation(
        &self,
        request: &PresentationGenerateRequest,
    ) -> Result<Presentation, ApiError> {
        self.check()?;
        Ok(Presentation::new(request.topic.clone(), Vec::new()))
    }

    async fn export_presentation(
        &self,
        request: &PresentationExportRequest,
    ) -> Result<ExportedFile, ApiError> {
        self.check()?;
        Ok(ExportedFile {
            filename: format!("deck.{}", request.format.extension()),
            content_type: None,
            bytes: b"PK".to_vec(),
        })
    }

    async fn list_presentations(&self) -> Result<Vec<Presentation>, ApiError> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn save_presentation(&self, _request: &SavePresentationRequest) -> Result<Value, ApiError> {
        self.check()?;
        Ok(json!({"success": true}))
    }

    async fn delete_presentation(&self, _id: &str) -> Result<(), ApiError> {
        self.check()
    }

    async fn zstyle_outline(&self, request: &OutlineRequest) -> Result<Outline, ApiError> {
        self.outline_requests.lock().unwrap().push(request.clone());
        self.check()?;
        Ok(outline())
    }

    async fn open_stream(&self, path: &str, body: &Value) -> Result<ByteStream, ApiError> {
        self.stream_bodies
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        self.check()?;
        let chunks: Vec<Result<Vec<u8>, ApiError>> = self
            .stream_records
            .iter()
            .map(|record| Ok(record.as_bytes().to_vec()))
            .collect();
        let canned = stream::iter(chunks);
        if self.hang {
            Ok(canned.chain(stream::pending()).boxed())
        } else {
            Ok(canned.boxed())
        }
    }

    async fn admin_check(&self) -> Result<AdminCheck, ApiError> {
        self.check()?;
        Ok(AdminCheck {
            is_admin: self.is_admin,
            email: Some("a@example.com".into()),
        })
    }
}

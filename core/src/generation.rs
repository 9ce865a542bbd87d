use crate::client::{
    BackendApi, ExportFormat, ExportedFile, PresentationExportRequest,
    PresentationGenerateRequest, ZStyleRequest,
};
use crate::error::ApiError;
use crate::notice::Notifier;
use crate::slides::{Outline, Presentation, Slide};
use crate::stream::{SseDecoder, StreamEvent};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const OUTLINE_STREAM_PATH: &str = "/api/zstyle/slides/stream";
pub const DIRECT_STREAM_PATH: &str = "/api/zslides/generate/stream";

/// How a consumed stream ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
    Done,
    Cancelled,
    /// The body ended without a terminal record.
    Ended,
}

/// Reads `stream` to its first terminal record, handing every decoded event
/// to `on_event` in arrival order.
///
/// Cancellation is checked before every read and between events, so a fired
/// token stops consumption without waiting for the next chunk. Transport
/// errors are returned as `Err`; malformed records are skipped by the decoder.
pub async fn consume_stream<S, F>(
    mut stream: S,
    cancel: &CancellationToken,
    mut on_event: F,
) -> Result<StreamOutcome, ApiError>
where
    S: Stream<Item = Result<Vec<u8>, ApiError>> + Unpin,
    F: FnMut(StreamEvent),
{
    let mut decoder = SseDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            next = stream.next() => next,
        };
        let events = match next {
            Some(Ok(chunk)) => decoder.push(&chunk),
            Some(Err(err)) => return Err(err),
            None => {
                let trailing = decoder.finish();
                if let Some(event) = trailing {
                    let outcome = terminal_outcome(&event);
                    on_event(event);
                    if let Some(outcome) = outcome {
                        return Ok(outcome);
                    }
                }
                return Ok(StreamOutcome::Ended);
            }
        };
        for event in events {
            if cancel.is_cancelled() {
                return Ok(StreamOutcome::Cancelled);
            }
            let outcome = terminal_outcome(&event);
            on_event(event);
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
    }
}

fn terminal_outcome(event: &StreamEvent) -> Option<StreamOutcome> {
    match event {
        StreamEvent::Complete { .. } => Some(StreamOutcome::Completed),
        StreamEvent::Error { message } => Some(StreamOutcome::Failed(message.clone())),
        StreamEvent::Done => Some(StreamOutcome::Done),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStep {
    Input,
    Outline,
    Generating,
    Complete,
}

#[derive(Serialize)]
struct SlidesFromOutline<'a> {
    outline: &'a Outline,
    #[serde(skip_serializing_if = "Option::is_none")]
    research_context: Option<&'a str>,
    generate_images: bool,
    user_id: Option<&'a str>,
}

/// Presentation editor state: the outline → slides step machine plus the
/// list of finished presentations.
pub struct PresentationWorkspace {
    step: GenerationStep,
    request: Option<ZStyleRequest>,
    outline: Option<Outline>,
    slides: Vec<Slide>,
    progress: Vec<String>,
    presentations: Vec<Presentation>,
    notifier: Notifier,
}

impl PresentationWorkspace {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            step: GenerationStep::Input,
            request: None,
            outline: None,
            slides: Vec::new(),
            progress: Vec::new(),
            presentations: Vec::new(),
            notifier,
        }
    }

    pub fn step(&self) -> GenerationStep {
        self.step
    }

    pub fn outline(&self) -> Option<&Outline> {
        self.outline.as_ref()
    }

    /// Slides received so far in the running (or last failed) generation.
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn progress(&self) -> &[String] {
        &self.progress
    }

    pub fn presentations(&self) -> &[Presentation] {
        &self.presentations
    }

    /// Replaces the outline after the user edited it.
    pub fn set_outline(&mut self, outline: Outline) {
        self.outline = Some(outline);
        if self.step == GenerationStep::Input {
            self.step = GenerationStep::Outline;
        }
    }

    pub fn remove_presentation(&mut self, id: &str) -> bool {
        let before = self.presentations.len();
        self.presentations.retain(|presentation| presentation.id != id);
        before != self.presentations.len()
    }

    pub fn reset(&mut self) {
        self.step = GenerationStep::Input;
        self.request = None;
        self.outline = None;
        self.slides.clear();
        self.progress.clear();
    }

    pub async fn generate_outline(&mut self, api: &dyn BackendApi, request: ZStyleRequest) -> bool {
        match api.zstyle_outline(&request.outline_request()).await {
            Ok(outline) => {
                tracing::info!(topic = %request.topic, slides = outline.outline.len(), "outline ready");
                self.outline = Some(outline);
                self.request = Some(request);
                self.step = GenerationStep::Outline;
                true
            }
            Err(err) => {
                tracing::warn!(%err, "outline generation failed");
                self.notifier.error(err.user_message());
                self.step = GenerationStep::Input;
                false
            }
        }
    }

    /// Streams full slides for the current outline.
    pub async fn generate_slides(
        &mut self,
        api: &dyn BackendApi,
        cancel: &CancellationToken,
    ) -> Option<Presentation> {
        let Some(outline) = self.outline.clone() else {
            self.notifier.error("Generate an outline before creating slides.");
            return None;
        };
        let request = self.request.clone();
        let body = SlidesFromOutline {
            outline: &outline,
            research_context: request.as_ref().and_then(|r| r.research_context.as_deref()),
            generate_images: request.as_ref().map(|r| r.generate_images).unwrap_or(true),
            user_id: request.as_ref().and_then(|r| r.user_id.as_deref()),
        };
        let body = match serde_json::to_value(&body) {
            Ok(body) => body,
            Err(err) => {
                self.notifier.error(ApiError::from(err).user_message());
                return None;
            }
        };
        self.run(api, OUTLINE_STREAM_PATH, body, &outline.title, GenerationStep::Outline, cancel)
            .await
    }

    /// Streams slides straight from a topic, skipping the outline review.
    pub async fn generate_direct(
        &mut self,
        api: &dyn BackendApi,
        request: ZStyleRequest,
        cancel: &CancellationToken,
    ) -> Option<Presentation> {
        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(err) => {
                self.notifier.error(ApiError::from(err).user_message());
                return None;
            }
        };
        let title = request.topic.clone();
        self.request = Some(request);
        self.run(api, DIRECT_STREAM_PATH, body, &title, GenerationStep::Input, cancel)
            .await
    }

    async fn run(
        &mut self,
        api: &dyn BackendApi,
        path: &str,
        body: Value,
        fallback_title: &str,
        fallback_step: GenerationStep,
        cancel: &CancellationToken,
    ) -> Option<Presentation> {
        self.step = GenerationStep::Generating;
        self.slides.clear();
        self.progress.clear();

        let outcome = match api.open_stream(path, &body).await {
            Ok(stream) => {
                let received = &mut self.slides;
                let progress = &mut self.progress;
                let mut completed: Option<(Option<String>, Vec<Slide>)> = None;
                let result = consume_stream(stream, cancel, |event| match event {
                    StreamEvent::Slide { slide, .. } => received.push(slide),
                    StreamEvent::Complete { title, slides, .. } => {
                        completed = Some((title, slides));
                    }
                    other => {
                        if let Some(message) = other.progress_message() {
                            progress.push(message.to_string());
                        }
                    }
                })
                .await;
                result.map(|outcome| (outcome, completed))
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok((StreamOutcome::Completed, Some((title, slides)))) => {
                let slides = if slides.is_empty() {
                    std::mem::take(&mut self.slides)
                } else {
                    slides
                };
                let title = title
                    .filter(|title| !title.trim().is_empty())
                    .unwrap_or_else(|| fallback_title.to_string());
                let mut presentation = Presentation::new(title, slides);
                if let Some(request) = &self.request {
                    presentation
                        .metadata
                        .insert("theme".to_string(), Value::String(request.theme.clone()));
                    presentation
                        .metadata
                        .insert("model".to_string(), Value::String(request.model.clone()));
                }
                tracing::info!(id = %presentation.id, slides = presentation.slides.len(), "presentation generated");
                self.notifier
                    .success(format!("Created {} slides", presentation.slides.len()));
                self.presentations.push(presentation.clone());
                self.step = GenerationStep::Complete;
                Some(presentation)
            }
            Ok((StreamOutcome::Cancelled, _)) => {
                tracing::info!("slide generation cancelled");
                self.abandon(fallback_step);
                self.notifier.info("Generation cancelled");
                None
            }
            Ok((StreamOutcome::Failed(message), _)) => {
                tracing::warn!(%message, "backend reported a generation error");
                self.abandon(fallback_step);
                self.notifier.error(message);
                None
            }
            Ok((outcome, _)) => {
                tracing::warn!(?outcome, "stream ended before completion");
                self.abandon(fallback_step);
                self.notifier
                    .error("Generation ended before all slides were received.");
                None
            }
            Err(err) => {
                tracing::warn!(%err, "slide stream failed");
                self.abandon(fallback_step);
                self.notifier.error(err.user_message());
                None
            }
        }
    }

    fn abandon(&mut self, step: GenerationStep) {
        self.slides.clear();
        self.step = step;
    }

    /// One-shot generation without streaming.
    pub async fn generate_presentation(
        &mut self,
        api: &dyn BackendApi,
        request: PresentationGenerateRequest,
    ) -> Option<Presentation> {
        match api.generate_presentation(&request).await {
            Ok(presentation) => {
                self.presentations.push(presentation.clone());
                self.step = GenerationStep::Complete;
                Some(presentation)
            }
            Err(err) => {
                tracing::warn!(%err, topic = %request.topic, "presentation generation failed");
                self.notifier.error(err.user_message());
                None
            }
        }
    }

    pub async fn export(
        &self,
        api: &dyn BackendApi,
        id: &str,
        format: ExportFormat,
        user_id: Option<String>,
    ) -> Option<ExportedFile> {
        let Some(presentation) = self.presentations.iter().find(|p| p.id == id) else {
            self.notifier.error("Presentation not found.");
            return None;
        };
        let request = PresentationExportRequest {
            presentation: presentation.clone(),
            user_id,
            format,
        };
        match api.export_presentation(&request).await {
            Ok(file) => {
                self.notifier.success(format!("Downloaded {}", file.filename));
                Some(file)
            }
            Err(err) => {
                tracing::warn!(%err, id, "export failed");
                self.notifier.error(err.user_message());
                None
            }
        }
    }
}

//! Slide and presentation model.
//!
//! The backend emits loosely-typed slide objects whose `type` field decides
//! which other fields matter. Fields shared by every kind live on [`Slide`];
//! the kind-specific ones live on [`SlideKind`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub content: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(flatten, deserialize_with = "kind_or_content")]
    pub kind: SlideKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlideKind {
    Title {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
    },
    Content,
    Stats {
        #[serde(default, deserialize_with = "null_as_default")]
        stats: Vec<Stat>,
    },
    Chart {
        #[serde(default, skip_serializing_if = "Option::is_none", alias = "chartType")]
        chart_type: Option<String>,
        #[serde(default, alias = "chartData", deserialize_with = "null_as_default")]
        chart_data: ChartData,
    },
    Steps {
        #[serde(default, deserialize_with = "null_as_default")]
        steps: Vec<Step>,
    },
    Quote {
        #[serde(default, deserialize_with = "null_as_default")]
        quote: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },
    List {
        #[serde(default, deserialize_with = "string_or_list")]
        items: Vec<String>,
    },
    Image,
    Closing,
    Conclusion,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stat {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartData {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Step {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

impl Slide {
    pub fn new(title: impl Into<String>, kind: SlideKind) -> Self {
        Self {
            id: None,
            slide_number: None,
            title: title.into(),
            content: Vec::new(),
            layout: None,
            key_message: None,
            image_url: None,
            kind,
        }
    }

    pub fn with_content(mut self, content: Vec<String>) -> Self {
        self.content = content;
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SlideKind::Title { .. } => "title",
            SlideKind::Content => "content",
            SlideKind::Stats { .. } => "stats",
            SlideKind::Chart { .. } => "chart",
            SlideKind::Steps { .. } => "steps",
            SlideKind::Quote { .. } => "quote",
            SlideKind::List { .. } => "list",
            SlideKind::Image => "image",
            SlideKind::Closing => "closing",
            SlideKind::Conclusion => "conclusion",
            SlideKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Presentation {
    #[serde(default = "new_presentation_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_slides")]
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn new_presentation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Presentation {
    pub fn new(title: impl Into<String>, slides: Vec<Slide>) -> Self {
        Self {
            id: new_presentation_id(),
            title: title.into(),
            slides,
            metadata: Map::new(),
        }
    }
}

/// Reviewable skeleton produced before full slide generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Outline {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outline: Vec<OutlineEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutlineEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub slide_number: u32,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub slide_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_message: Option<String>,
}

/// Reads an explicit `null` the same as a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a slide list one entry at a time, dropping entries that fail.
pub(crate) fn lenient_slides<'de, D>(deserializer: D) -> Result<Vec<Slide>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Slide>(item) {
            Ok(slide) => Some(slide),
            Err(err) => {
                tracing::warn!(%err, "dropping unreadable slide");
                None
            }
        })
        .collect())
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![text],
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect(),
        Some(other) => vec![other.to_string()],
    })
}

/// Slides without a `type` are plain content slides.
fn kind_or_content<'de, D>(deserializer: D) -> Result<SlideKind, D::Error>
where
    D: Deserializer<'de>,
{
    let mut fields = Map::<String, Value>::deserialize(deserializer)?;
    let missing = matches!(fields.get("type"), None | Some(Value::Null));
    if missing {
        fields.insert("type".to_string(), Value::String("content".to_string()));
    }
    SlideKind::deserialize(Value::Object(fields)).map_err(serde::de::Error::custom)
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

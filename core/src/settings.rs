use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// Which backend capability a chat message is routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMode {
    #[default]
    Standard,
    DeepResearch,
    RealtimeResearch,
    Agent,
}

/// Process-wide UI configuration read by every outgoing call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    #[serde(default)]
    pub theme: ThemeMode,
    #[serde(default = "AppSettings::default_model")]
    pub selected_model: String,
    #[serde(default = "AppSettings::default_search_engine")]
    pub search_engine: String,
    #[serde(default)]
    pub deep_research_mode: bool,
    #[serde(default)]
    pub realtime_research_mode: bool,
    #[serde(default)]
    pub agent_mode: bool,
    #[serde(default = "AppSettings::default_sidebar_open")]
    pub sidebar_open: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: ThemeMode::default(),
            selected_model: AppSettings::default_model(),
            search_engine: AppSettings::default_search_engine(),
            deep_research_mode: false,
            realtime_research_mode: false,
            agent_mode: false,
            sidebar_open: AppSettings::default_sidebar_open(),
        }
    }
}

impl AppSettings {
    fn default_model() -> String {
        "gemini-2.0-flash-exp".to_string()
    }

    fn default_search_engine() -> String {
        "hybrid".to_string()
    }

    fn default_sidebar_open() -> bool {
        true
    }

    /// Shallow merge: only the fields present in `patch` change.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(model) = patch.selected_model {
            self.selected_model = model;
        }
        if let Some(engine) = patch.search_engine {
            self.search_engine = engine;
        }
        if let Some(flag) = patch.deep_research_mode {
            self.deep_research_mode = flag;
        }
        if let Some(flag) = patch.realtime_research_mode {
            self.realtime_research_mode = flag;
        }
        if let Some(flag) = patch.agent_mode {
            self.agent_mode = flag;
        }
        if let Some(open) = patch.sidebar_open {
            self.sidebar_open = open;
        }
    }

    pub fn research_mode(&self) -> ResearchMode {
        if self.deep_research_mode {
            ResearchMode::DeepResearch
        } else if self.realtime_research_mode {
            ResearchMode::RealtimeResearch
        } else if self.agent_mode {
            ResearchMode::Agent
        } else {
            ResearchMode::Standard
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_research_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime_research_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidebar_open: Option<bool>,
}

impl SettingsPatch {
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            selected_model: Some(model.into()),
            ..Self::default()
        }
    }

    pub fn theme(theme: ThemeMode) -> Self {
        Self {
            theme: Some(theme),
            ..Self::default()
        }
    }
}

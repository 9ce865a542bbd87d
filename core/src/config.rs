use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Where the gateway forwards to and which credentials it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub api_url: Url,
    pub backend_url: Url,
    pub backend_api_secret: String,
    pub api_key: Option<String>,
    pub nextauth_secret: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("backend secret not configured: set BACKEND_API_SECRET or NEXT_PUBLIC_API_KEY")]
    MissingSecret,
    #[error("invalid {name}: {value:?} ({source})")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingSecret => {
                "Backend not configured. Set BACKEND_API_SECRET in .env or deepdesk.yaml.".to_string()
            }
            other => format!("{other}. Update .env or deepdesk.yaml."),
        }
    }
}

impl BackendSettings {
    /// Loads `.env`, then the process environment, then `deepdesk.yaml`
    /// defaults. Environment values win over the file.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let file = match locate_config_file() {
            Some(path) => {
                let contents = fs::read_to_string(&path).map_err(|err| {
                    ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
                })?;
                let file: FileSection = serde_yaml::from_str(&contents)
                    .map_err(|err| ConfigError::Invalid(format!("invalid deepdesk.yaml: {err}")))?;
                tracing::debug!(path = %path.display(), "loaded deepdesk.yaml");
                file
            }
            None => FileSection::default(),
        };
        resolve(file, |name| std::env::var(name).ok())
    }

    /// One-line summary safe to print.
    pub fn redacted(&self) -> String {
        format!(
            "api_url={} backend_url={} secret={} google_oauth={}",
            self.api_url,
            self.backend_url,
            mask(&self.backend_api_secret),
            self.google_client_id.is_some() && self.google_client_secret.is_some()
        )
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(3).collect();
    format!("{visible}***")
}

/// `deepdesk.yaml` keys, all optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileSection {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub backend_api_secret: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub nextauth_secret: Option<String>,
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,
}

/// Merges `lookup` (environment) over `file` and validates the result.
pub fn resolve<F>(file: FileSection, lookup: F) -> Result<BackendSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |name: &str, fallback: Option<String>| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| fallback.map(|value| value.trim().to_string()))
            .filter(|value| !value.is_empty())
    };

    let api_url = pick("NEXT_PUBLIC_API_URL", file.api_url);
    let backend_url = pick("NEXT_PUBLIC_BACKEND_URL", file.backend_url);
    let api_url_raw = api_url
        .clone()
        .or_else(|| backend_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let backend_url_raw = backend_url.or(api_url).unwrap_or_else(|| api_url_raw.clone());

    let api_key = pick("NEXT_PUBLIC_API_KEY", file.api_key);
    let backend_api_secret = pick("BACKEND_API_SECRET", file.backend_api_secret)
        .or_else(|| api_key.clone())
        .ok_or(ConfigError::MissingSecret)?;

    Ok(BackendSettings {
        api_url: parse_url("NEXT_PUBLIC_API_URL", &api_url_raw)?,
        backend_url: parse_url("NEXT_PUBLIC_BACKEND_URL", &backend_url_raw)?,
        backend_api_secret,
        api_key,
        nextauth_secret: pick("NEXTAUTH_SECRET", file.nextauth_secret),
        google_client_id: pick("GOOGLE_CLIENT_ID", file.google_client_id),
        google_client_secret: pick("GOOGLE_CLIENT_SECRET", file.google_client_secret),
    })
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let trimmed = value.trim_end_matches('/');
    Url::parse(trimmed).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })
}

fn locate_config_file() -> Option<PathBuf> {
    deepdesk_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn deepdesk_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("deepdesk.yaml")];
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("deepdesk");
        paths.push(config_dir.join("deepdesk.yaml"));
        paths.push(config_dir.join("deepdesk.yml"));
        paths.push(base.home_dir().join(".deepdesk").join("deepdesk.yaml"));
    }
    paths
}

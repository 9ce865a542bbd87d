use anyhow::{Context, Result};
use deepdesk_core::SESSION_COOKIE;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Listener and session settings read from `server.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_cookie_name")]
    pub cookie_name: String,
    /// Emails that get a session at startup.
    #[serde(default)]
    pub dev_users: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: ServerSettings::default_host(),
            port: ServerSettings::default_port(),
            cookie_name: ServerSettings::default_cookie_name(),
            dev_users: Vec::new(),
        }
    }
}

impl ServerSettings {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_cookie_name() -> String {
        SESSION_COOKIE.to_string()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads `server.yaml` from the user config dir. A missing file yields the
/// defaults; an unreadable or invalid one is logged and also yields defaults.
pub async fn load_server_settings() -> ServerSettings {
    load_server_settings_from(&server_settings_path()).await
}

pub async fn load_server_settings_from(path: &Path) -> ServerSettings {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_yaml::from_str(&contents) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    error = ?err,
                    "failed to parse server.yaml at {}, using defaults",
                    path.display()
                );
                ServerSettings::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => ServerSettings::default(),
        Err(err) => {
            warn!(
                error = ?err,
                "failed to read server.yaml at {}, using defaults",
                path.display()
            );
            ServerSettings::default()
        }
    }
}

pub async fn save_server_settings(path: &Path, settings: &ServerSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(settings)?;
    tokio::fs::write(path, serialized)
        .await
        .with_context(|| format!("failed to write server.yaml at {}", path.display()))
}

pub fn server_settings_path() -> PathBuf {
    config_dir().join("server.yaml")
}

fn config_dir() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        base.config_dir().join("deepdesk")
    } else {
        PathBuf::from(".deepdesk")
    }
}

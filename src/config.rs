//! Process-wide configuration, loaded once at startup.
//!
//! Values come from a TOML file (`$TASKBOARD_CONFIG`, or
//! `<config dir>/taskboard-tui/config.toml`) and are then overridden by
//! environment variables, which `main` populates from `.env` first.

use crate::error::ConfigError;
use crate::models::{BoardId, Credentials, Status};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_COOKIE: &str = "booking_access_token";

/// Whether session cookies travel with API requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPolicy {
    Include,
    Omit,
}

/// What happens to an optimistically moved card when its status update fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    Rollback,
    KeepOptimistic,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub credentials: CredentialPolicy,
    pub session_cookie: String,
    pub session_token: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub columns: Vec<Status>,
    pub default_board: Option<BoardId>,
    pub on_failure: FailurePolicy,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: CredentialPolicy::Include,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            session_token: None,
            email: None,
            password: None,
            columns: vec!["Запланировано".into(), "В работе".into(), "Готово".into()],
            default_board: None,
            on_failure: FailurePolicy::Rollback,
            log_file: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = env::var("TASKBOARD_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("taskboard-tui").join("config.toml"))
    }

    /// Load the config file if there is one, then apply environment overrides.
    pub fn load() -> Result<Config, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_toml_str(&content)?
            }
            _ => Config::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TASKBOARD_URL") {
            self.base_url = url;
        }
        if let Some(email) = lookup("TASKBOARD_EMAIL") {
            self.email = Some(email);
        }
        if let Some(password) = lookup("TASKBOARD_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(token) = lookup("TASKBOARD_SESSION") {
            self.session_token = Some(token);
        }
        if let Some(board) = lookup("TASKBOARD_BOARD") {
            let id = board.trim().parse().map_err(|_| ConfigError::Env {
                key: "TASKBOARD_BOARD",
                value: board.clone(),
            })?;
            self.default_board = Some(id);
        }
        Ok(())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(|| {
            dirs::data_local_dir().map(|dir| dir.join("taskboard-tui").join("taskboard.log"))
        })
    }
}

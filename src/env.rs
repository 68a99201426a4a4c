use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::AppError;

const DEFAULT_SESSION_HOURS: i64 = 8;
const DEFAULT_SESSION_CLEANUP_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_hours: i64,
    pub session_cleanup_secs: u64,
    pub initial_admin: Option<InitialAdmin>,
}

#[derive(Clone)]
pub struct InitialAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for InitialAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitialAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = dotenvy::var("DATABASE_URL")
            .map_err(|_| AppError::Internal("DATABASE_URL must be set".to_string()))?;

        let initial_admin = match (
            dotenvy::var("INITIAL_ADMIN_USERNAME").ok(),
            dotenvy::var("INITIAL_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(InitialAdmin { username, password })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            session_hours: parse_var("SESSION_HOURS", DEFAULT_SESSION_HOURS)?,
            session_cleanup_secs: parse_var("SESSION_CLEANUP_SECS", DEFAULT_SESSION_CLEANUP_SECS)?,
            initial_admin,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            session_hours: DEFAULT_SESSION_HOURS,
            session_cleanup_secs: DEFAULT_SESSION_CLEANUP_SECS,
            initial_admin: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match dotenvy::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::Internal(format!("{} has an invalid value: {}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

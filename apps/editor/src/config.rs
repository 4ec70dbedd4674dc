use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::session::DocumentId;

/// 20 MiB of UTF-8 serialized document.
pub const DEFAULT_LOCAL_QUOTA_BYTES: usize = 20 * 1024 * 1024;
pub const GUEST_SNAPSHOT_KEY: &str = "guest_resume";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// Twice the HTTP timeout, so a hung request fails in the client before the
/// scheduler abandons it.
pub const DEFAULT_SAVE_TIMEOUT_SECS: u64 = 60;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub resume_id: DocumentId,
    pub local_storage_dir: PathBuf,
    pub save_debounce: Duration,
    pub preview_debounce: Duration,
    pub local_quota_bytes: usize,
    pub save_timeout: Option<Duration>,
    pub preview_target: String,
    pub http_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let resume_id = match std::env::var("RESUME_ID") {
            Ok(raw) => raw
                .parse::<DocumentId>()
                .with_context(|| format!("RESUME_ID must be 'new' or a numeric id, got '{raw}'"))?,
            Err(_) => DocumentId::Unassigned,
        };

        let save_timeout_secs: u64 = env_or("SAVE_TIMEOUT_SECS", DEFAULT_SAVE_TIMEOUT_SECS)?;

        Ok(Config {
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            auth_token: std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
            resume_id,
            local_storage_dir: std::env::var("LOCAL_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./.local_storage")),
            save_debounce: Duration::from_millis(env_or("SAVE_DEBOUNCE_MS", 1000)?),
            preview_debounce: Duration::from_millis(env_or("PREVIEW_DEBOUNCE_MS", 300)?),
            local_quota_bytes: env_or("LOCAL_QUOTA_BYTES", DEFAULT_LOCAL_QUOTA_BYTES)?,
            save_timeout: (save_timeout_secs > 0).then(|| Duration::from_secs(save_timeout_secs)),
            preview_target: std::env::var("PREVIEW_TARGET")
                .unwrap_or_else(|_| "preview-frame".to_string()),
            http_timeout: Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn settings(&self) -> EditorSettings {
        EditorSettings {
            save_debounce: self.save_debounce,
            preview_debounce: self.preview_debounce,
            save_timeout: self.save_timeout,
            local_quota_bytes: self.local_quota_bytes,
            snapshot_key: GUEST_SNAPSHOT_KEY.to_string(),
            preview_target: self.preview_target.clone(),
        }
    }
}

/// Runtime knobs of an editing session.
#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub save_debounce: Duration,
    pub preview_debounce: Duration,
    pub save_timeout: Option<Duration>,
    pub local_quota_bytes: usize,
    pub snapshot_key: String,
    pub preview_target: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(1000),
            preview_debounce: Duration::from_millis(300),
            save_timeout: Some(Duration::from_secs(DEFAULT_SAVE_TIMEOUT_SECS)),
            local_quota_bytes: DEFAULT_LOCAL_QUOTA_BYTES,
            snapshot_key: GUEST_SNAPSHOT_KEY.to_string(),
            preview_target: "preview-frame".to_string(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

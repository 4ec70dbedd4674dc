use std::sync::Arc;

use crate::config::{Config, EditorSettings};
use crate::errors::RemoteError;
use crate::preview::{HttpPreviewSurface, PreviewSurface};
use crate::remote::{HttpRemoteStore, RemoteResumeStore};
use crate::storage::{FileStorage, LocalStorage};

/// External collaborators of an editing session, built once and shared by
/// every session opened from it.
#[derive(Clone)]
pub struct AppState {
    pub remote: Arc<dyn RemoteResumeStore>,
    pub local: Arc<dyn LocalStorage>,
    pub preview: Arc<dyn PreviewSurface>,
    pub settings: EditorSettings,
}

impl AppState {
    /// HTTP remote store, file-backed device storage and the HTTP preview endpoint.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Ok(Self {
            remote: Arc::new(HttpRemoteStore::new(&config.api_base_url, config.http_timeout)?),
            local: Arc::new(FileStorage::new(&config.local_storage_dir)),
            preview: Arc::new(HttpPreviewSurface::new(&config.api_base_url, config.http_timeout)?),
            settings: config.settings(),
        })
    }
}

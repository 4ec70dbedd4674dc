use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures talking to the remote record API.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("API rejected the request: {0}")]
    Rejected(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the local device storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Why a single save attempt failed. None of these are fatal to the session.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Remote save failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Local save failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Could not serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Document is {size} bytes, over the {limit} byte local storage quota")]
    QuotaExceeded { size: usize, limit: usize },

    #[error("Server accepted the new resume but returned no identifier")]
    MissingIdentifier,

    /// The scheduler stopped waiting. The request itself may still land: a
    /// create that the server commits after this fires leaves the id
    /// unassigned, and the next save creates a second record. Keep the save
    /// timeout above the HTTP client timeout so the transport gives up first.
    #[error("Save did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Saving to the server requires signing in")]
    NotAuthenticated,
}

/// Errors while opening an editing session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Sign in to open this resume")]
    AuthenticationRequired,

    #[error("Could not load resume: {0}")]
    Remote(#[from] RemoteError),

    #[error("Could not read local draft: {0}")]
    Storage(#[from] StorageError),

    #[error("Local draft is corrupt: {0}")]
    CorruptSnapshot(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A user-facing message about a failed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    /// The user can fix this themselves; repeating the same save will not help.
    pub actionable: bool,
}

impl SaveError {
    /// Whether an identical retry could succeed. Quota failures are
    /// deterministic for the same document.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            SaveError::QuotaExceeded { .. } | SaveError::Serialize(_) | SaveError::NotAuthenticated
        )
    }

    pub fn notice(&self) -> Notice {
        match self {
            SaveError::QuotaExceeded { size, limit } => Notice {
                severity: Severity::Error,
                message: format!(
                    "This resume is too large to keep on this device ({} KiB, limit {} KiB). Sign in to save larger documents.",
                    size / 1024,
                    limit / 1024
                ),
                actionable: true,
            },
            SaveError::NotAuthenticated => Notice {
                severity: Severity::Error,
                message: "Sign in to save this resume.".to_string(),
                actionable: true,
            },
            SaveError::Serialize(e) => {
                tracing::error!("Serialization error: {e}");
                Notice {
                    severity: Severity::Error,
                    message: "This resume could not be saved.".to_string(),
                    actionable: false,
                }
            }
            other => Notice {
                severity: Severity::Warning,
                message: format!("Failed to save resume: {other}"),
                actionable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_notice_is_actionable() {
        let notice = SaveError::QuotaExceeded {
            size: 21 * 1024 * 1024,
            limit: 20 * 1024 * 1024,
        }
        .notice();
        assert!(notice.actionable);
        assert_eq!(notice.severity, Severity::Error);
        assert!(notice.message.contains("Sign in"));
    }

    #[test]
    fn test_remote_failure_is_transient_warning() {
        let err = SaveError::Remote(RemoteError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });
        assert!(err.is_transient());
        let notice = err.notice();
        assert_eq!(notice.severity, Severity::Warning);
        assert!(!notice.actionable);
        assert!(notice.message.contains("503"));
    }

    #[test]
    fn test_quota_is_not_transient() {
        let err = SaveError::QuotaExceeded { size: 2, limit: 1 };
        assert!(!err.is_transient());
        assert!(SaveError::MissingIdentifier.is_transient());
        assert!(SaveError::Timeout(Duration::from_secs(1)).is_transient());
    }
}

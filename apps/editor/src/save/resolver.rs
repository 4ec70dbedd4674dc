//! Persistence Target Resolver: picks where a save goes and performs it.
//!
//! The target is resolved on every attempt from the session as it is at that
//! moment, never cached, so signing in mid-session redirects the next save to
//! the server.

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::SaveError;
use crate::models::Resume;
use crate::remote::RemoteResumeStore;
use crate::session::{DocumentId, SessionContext};
use crate::storage::LocalStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceTarget {
    Remote(DocumentId),
    LocalSnapshot { key: String, size_limit: usize },
}

/// What a successful save did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Local { bytes: usize },
    Created { id: i64 },
    Updated { id: i64 },
}

pub struct PersistenceResolver {
    remote: Arc<dyn RemoteResumeStore>,
    local: Arc<dyn LocalStorage>,
    snapshot_key: String,
    quota_bytes: usize,
}

impl PersistenceResolver {
    pub fn new(
        remote: Arc<dyn RemoteResumeStore>,
        local: Arc<dyn LocalStorage>,
        snapshot_key: impl Into<String>,
        quota_bytes: usize,
    ) -> Self {
        Self {
            remote,
            local,
            snapshot_key: snapshot_key.into(),
            quota_bytes,
        }
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    pub fn resolve(&self, session: &SessionContext) -> PersistenceTarget {
        if session.is_authenticated() {
            PersistenceTarget::Remote(session.document_id())
        } else {
            PersistenceTarget::LocalSnapshot {
                key: self.snapshot_key.clone(),
                size_limit: self.quota_bytes,
            }
        }
    }

    pub async fn persist(
        &self,
        session: &SessionContext,
        resume: &Resume,
    ) -> Result<SaveOutcome, SaveError> {
        match self.resolve(session) {
            PersistenceTarget::LocalSnapshot { key, size_limit } => {
                let outcome = self.write_local(&key, size_limit, resume).await?;
                session.claim_guest_draft();
                Ok(outcome)
            }
            PersistenceTarget::Remote(DocumentId::Assigned(id)) => {
                let token = session.auth_token().ok_or(SaveError::NotAuthenticated)?;
                self.remote.update(&token, id, resume).await?;
                self.release_guest_snapshot(session).await;
                Ok(SaveOutcome::Updated { id })
            }
            PersistenceTarget::Remote(DocumentId::Unassigned) => {
                let token = session.auth_token().ok_or(SaveError::NotAuthenticated)?;
                let created = self.remote.create(&token, resume).await?;
                let id = created.id.ok_or(SaveError::MissingIdentifier)?;
                if !session.assign_id(id) {
                    // Another create won the race; the session keeps its original id.
                    warn!(id, current = %session.document_id(), "ignoring second record id");
                }
                self.release_guest_snapshot(session).await;
                Ok(SaveOutcome::Created { id })
            }
        }
    }

    /// Rejects oversized documents before touching storage, so a failed
    /// attempt never clobbers the previous snapshot.
    async fn write_local(
        &self,
        key: &str,
        size_limit: usize,
        resume: &Resume,
    ) -> Result<SaveOutcome, SaveError> {
        let serialized = resume.to_json()?;
        let size = serialized.len();
        if size > size_limit {
            return Err(SaveError::QuotaExceeded {
                size,
                limit: size_limit,
            });
        }
        self.local.set(key, &serialized).await?;
        Ok(SaveOutcome::Local { bytes: size })
    }

    /// The server now holds this session's document. Drops the guest draft,
    /// but only when the session owns it; a draft this session never loaded
    /// or wrote is left alone.
    async fn release_guest_snapshot(&self, session: &SessionContext) {
        if !session.release_guest_draft() {
            return;
        }
        match self.local.remove(&self.snapshot_key).await {
            Ok(()) => info!(key = %self.snapshot_key, "guest draft migrated to server"),
            Err(e) => {
                session.claim_guest_draft();
                warn!("Could not remove migrated guest draft: {e}");
            }
        }
    }
}

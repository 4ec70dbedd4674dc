//! Document Store: the single mutation entry point of an editing session.
//!
//! An update replaces one top-level field, flips the save status to
//! `Unsaved`, restarts the autosave timer and restarts the preview timer.
//! Persistence and preview never wait on each other.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::errors::{SaveError, SessionError};
use crate::models::{Resume, ResumeUpdate};
use crate::preview::PreviewBridge;
use crate::save::{PersistenceResolver, SaveFailure, SaveKind, SaveScheduler, SaveStatus};
use crate::session::{AuthToken, DocumentId, SessionContext};
use crate::state::AppState;

pub struct DocumentStore {
    document: watch::Sender<Resume>,
    session: Arc<SessionContext>,
    scheduler: Arc<SaveScheduler>,
    resolver: Arc<PersistenceResolver>,
    preview: Arc<PreviewBridge>,
}

impl DocumentStore {
    /// Opens a session, hydrating the document from wherever it lives.
    pub async fn open(state: &AppState, session: Arc<SessionContext>) -> Result<Arc<Self>, SessionError> {
        let resume = hydrate(state, &session).await?;
        info!(route = %session.route(), signed_in = session.is_authenticated(), "editing session opened");
        Ok(Self::with_document(state, session, resume))
    }

    pub fn with_document(state: &AppState, session: Arc<SessionContext>, resume: Resume) -> Arc<Self> {
        let settings = &state.settings;
        let (document, document_rx) = watch::channel(resume);
        let preview = Arc::new(PreviewBridge::new(
            state.preview.clone(),
            document_rx,
            settings.preview_target.clone(),
            settings.preview_debounce,
        ));
        let resolver = Arc::new(PersistenceResolver::new(
            state.remote.clone(),
            state.local.clone(),
            settings.snapshot_key.clone(),
            settings.local_quota_bytes,
        ));
        let scheduler = Arc::new(SaveScheduler::new(settings.save_debounce, settings.save_timeout));

        Arc::new(Self {
            document,
            session,
            scheduler,
            resolver,
            preview,
        })
    }

    pub fn update(self: &Arc<Self>, update: ResumeUpdate) {
        let field = update.field();
        self.document.send_modify(|resume| update.apply(resume));
        self.scheduler.mark_unsaved();
        debug!(field, revision = self.scheduler.revision(), "document updated");

        let store = Arc::clone(self);
        self.scheduler.schedule_debounced(move || store.persist_current());
        self.preview.notify();
    }

    /// A user-requested save. Waits behind any save in flight.
    pub async fn save(self: &Arc<Self>) -> Result<(), SaveError> {
        let store = Arc::clone(self);
        self.scheduler
            .execute_save(SaveKind::Manual, move || store.persist_current())
            .await
    }

    /// Signs the session in. The next save re-resolves to the server, which
    /// promotes the guest draft to a server record.
    pub fn sign_in(self: &Arc<Self>, token: AuthToken) {
        self.session.set_auth(Some(token));
        self.scheduler.mark_unsaved();
        let store = Arc::clone(self);
        self.scheduler.schedule_debounced(move || store.persist_current());
    }

    pub fn sign_out(&self) {
        self.session.set_auth(None);
    }

    pub fn set_template_override(&self, template: Option<String>) {
        self.preview.set_template_override(template);
    }

    /// Ends the session: drops pending timers and saves once more if the
    /// latest edits are not stored yet. A document whose last save was
    /// rejected outright is not retried.
    pub async fn close(self: &Arc<Self>) -> Result<(), SaveError> {
        let had_pending_save = self.scheduler.cancel_pending();
        self.preview.cancel_pending();
        if self.scheduler.is_rejected() {
            info!(revision = self.scheduler.revision(), "last save was rejected; skipping final save");
        } else if had_pending_save || self.status() != SaveStatus::Saved {
            let store = Arc::clone(self);
            self.scheduler
                .execute_save(SaveKind::Autosave, move || store.persist_current())
                .await?;
        }
        info!(route = %self.session.route(), "editing session closed");
        Ok(())
    }

    pub fn document(&self) -> Resume {
        self.document.borrow().clone()
    }

    pub fn subscribe_document(&self) -> watch::Receiver<Resume> {
        self.document.subscribe()
    }

    pub fn status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.scheduler.subscribe_status()
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SaveStatus> {
        self.scheduler.subscribe_transitions()
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<SaveFailure> {
        self.scheduler.subscribe_failures()
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn route(&self) -> String {
        self.session.route()
    }

    pub fn scheduler(&self) -> &Arc<SaveScheduler> {
        &self.scheduler
    }

    /// Snapshots the document now and returns the write of that snapshot.
    fn persist_current(self: Arc<Self>) -> impl Future<Output = Result<(), SaveError>> + Send + 'static {
        let snapshot = self.document.borrow().clone();
        async move {
            let outcome = self.resolver.persist(&self.session, &snapshot).await?;
            debug!(?outcome, "document persisted");
            Ok(())
        }
    }
}

async fn hydrate(state: &AppState, session: &SessionContext) -> Result<Resume, SessionError> {
    match (session.document_id(), session.auth_token()) {
        (DocumentId::Assigned(id), Some(token)) => Ok(state.remote.read(&token, id).await?),
        (DocumentId::Assigned(_), None) => Err(SessionError::AuthenticationRequired),
        (DocumentId::Unassigned, None) => match state.local.get(&state.settings.snapshot_key).await? {
            Some(raw) => {
                debug!(bytes = raw.len(), "restoring guest draft");
                let resume = Resume::from_json(&raw)?;
                session.claim_guest_draft();
                Ok(resume)
            }
            None => Ok(Resume::default()),
        },
        (DocumentId::Unassigned, Some(_)) => Ok(Resume::default()),
    }
}

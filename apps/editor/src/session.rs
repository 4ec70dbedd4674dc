//! Session state shared by the save and preview pipelines.
//!
//! The context is created once per editing session and handed to every
//! component explicitly. Both values are `watch` channels so UI code (the
//! route in the address bar, the sign-in badge) can follow them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::info;

/// Route segment standing in for a record that does not exist yet.
pub const NEW_SENTINEL: &str = "new";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentId {
    Unassigned,
    Assigned(i64),
}

impl DocumentId {
    pub fn assigned(self) -> Option<i64> {
        match self {
            DocumentId::Assigned(id) => Some(id),
            DocumentId::Unassigned => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Unassigned => f.write_str(NEW_SENTINEL),
            DocumentId::Assigned(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is neither 'new' nor a numeric id")]
pub struct InvalidDocumentId(String);

impl FromStr for DocumentId {
    type Err = InvalidDocumentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == NEW_SENTINEL {
            return Ok(DocumentId::Unassigned);
        }
        s.parse::<i64>()
            .map(DocumentId::Assigned)
            .map_err(|_| InvalidDocumentId(s.to_string()))
    }
}

/// Bearer credential issued by the auth service. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

pub struct SessionContext {
    auth: watch::Sender<Option<AuthToken>>,
    document_id: watch::Sender<DocumentId>,
    /// Set while the device's guest draft holds this session's document.
    guest_draft: AtomicBool,
}

impl SessionContext {
    pub fn new(auth: Option<AuthToken>, document_id: DocumentId) -> Self {
        let (auth, _) = watch::channel(auth);
        let (document_id, _) = watch::channel(document_id);
        Self {
            auth,
            document_id,
            guest_draft: AtomicBool::new(false),
        }
    }

    pub fn guest() -> Self {
        Self::new(None, DocumentId::Unassigned)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.borrow().is_some()
    }

    pub fn auth_token(&self) -> Option<AuthToken> {
        self.auth.borrow().clone()
    }

    pub fn set_auth(&self, token: Option<AuthToken>) {
        let signed_in = token.is_some();
        self.auth.send_replace(token);
        info!(signed_in, "session authentication changed");
    }

    pub fn subscribe_auth(&self) -> watch::Receiver<Option<AuthToken>> {
        self.auth.subscribe()
    }

    pub fn document_id(&self) -> DocumentId {
        *self.document_id.borrow()
    }

    /// Moves the id from `Unassigned` to `id`. Returns `false` and leaves the
    /// current id alone when one is already assigned.
    pub fn assign_id(&self, id: i64) -> bool {
        let assigned = self.document_id.send_if_modified(|current| match current {
            DocumentId::Unassigned => {
                *current = DocumentId::Assigned(id);
                true
            }
            DocumentId::Assigned(_) => false,
        });
        if assigned {
            info!(id, route = %self.route(), "resume record assigned");
        }
        assigned
    }

    pub fn subscribe_document_id(&self) -> watch::Receiver<DocumentId> {
        self.document_id.subscribe()
    }

    /// Records that the guest draft on this device is this session's document,
    /// either because the session was opened from it or wrote it.
    pub fn claim_guest_draft(&self) {
        self.guest_draft.store(true, Ordering::SeqCst);
    }

    pub fn holds_guest_draft(&self) -> bool {
        self.guest_draft.load(Ordering::SeqCst)
    }

    /// Drops the claim. Returns whether it was held.
    pub fn release_guest_draft(&self) -> bool {
        self.guest_draft.swap(false, Ordering::SeqCst)
    }

    /// The editor route for the current id, e.g. `/resume/new` or `/resume/42`.
    pub fn route(&self) -> String {
        route_for(self.document_id())
    }
}

pub fn route_for(id: DocumentId) -> String {
    format!("/resume/{id}")
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::models::Resume;
use crate::preview::surface::{PreviewRequest, PreviewSurface};

/// Keeps the rendering surface roughly in step with the document.
///
/// Every change restarts a short timer; when it fires the whole current
/// document is serialized and dispatched. Nothing is awaited and nothing is
/// acknowledged. Renders may complete out of order, so the surface can briefly
/// show a stale frame until the newest one lands.
pub struct PreviewBridge {
    surface: Arc<dyn PreviewSurface>,
    document: watch::Receiver<Resume>,
    template_override: Mutex<Option<String>>,
    target: String,
    debouncer: Debouncer,
}

impl PreviewBridge {
    pub fn new(
        surface: Arc<dyn PreviewSurface>,
        document: watch::Receiver<Resume>,
        target: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            surface,
            document,
            template_override: Mutex::new(None),
            target: target.into(),
            debouncer: Debouncer::new(delay),
        }
    }

    /// The document changed; (re)start the render timer.
    pub fn notify(self: &Arc<Self>) {
        let bridge = Arc::clone(self);
        self.debouncer.schedule(move || async move { bridge.render_now() });
    }

    /// Shows the document in another template without committing to it.
    /// `None` goes back to the document's own template.
    pub fn set_template_override(self: &Arc<Self>, template: Option<String>) {
        *self.lock_override() = template;
        self.notify();
    }

    pub fn template_override(&self) -> Option<String> {
        self.lock_override().clone()
    }

    pub fn cancel_pending(&self) -> bool {
        self.debouncer.cancel()
    }

    /// Serializes the current document and sends it immediately.
    pub fn render_now(&self) {
        let snapshot = self.document.borrow().clone();
        let snapshot = match self.template_override() {
            Some(template) => snapshot.with_template(&template),
            None => snapshot,
        };
        let resume_data = match snapshot.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("preview skipped, document did not serialize: {e}");
                return;
            }
        };
        debug!(
            frame = %self.target,
            template = %snapshot.template_name,
            bytes = resume_data.len(),
            "dispatching preview"
        );
        self.surface.dispatch(PreviewRequest {
            target: self.target.clone(),
            resume_data,
        });
    }

    fn lock_override(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.template_override
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

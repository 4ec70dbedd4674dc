//! Save Scheduler: turns a stream of edits into few persistence calls.
//!
//! Two guarantees:
//! - debounced autosaves collapse a burst of edits into one attempt;
//! - at most one save executes at any instant. A save requested while another
//!   is running waits for it, then runs against whatever document state is
//!   current when it starts.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::errors::{Notice, SaveError};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    Saving,
    Unsaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveKind {
    /// Fired by the debounce timer; never shows the blocking spinner.
    Autosave,
    /// Requested by the user.
    Manual,
}

/// A save failure as reported to listeners.
#[derive(Debug, Clone)]
pub struct SaveFailure {
    pub kind: SaveKind,
    pub notice: Notice,
}

pub struct SaveScheduler {
    status: watch::Sender<SaveStatus>,
    transitions: broadcast::Sender<SaveStatus>,
    failures: broadcast::Sender<SaveFailure>,
    busy: watch::Sender<bool>,
    last_saved_at: watch::Sender<Option<DateTime<Utc>>>,
    /// Bumped on every edit; lets a finished save tell whether it covered the latest state.
    revision: AtomicU64,
    /// Revision whose last save failed for a reason retrying cannot fix.
    rejected: watch::Sender<Option<u64>>,
    /// Single-flight slot. Held for the whole duration of one save.
    in_flight: Mutex<()>,
    debouncer: Debouncer,
    timeout: Option<Duration>,
}

/// Clears the manual busy flag when a save ends, including when its future is dropped.
struct BusyGuard<'a>(Option<&'a watch::Sender<bool>>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Some(busy) = self.0 {
            busy.send_replace(false);
        }
    }
}

impl SaveScheduler {
    pub fn new(debounce: Duration, timeout: Option<Duration>) -> Self {
        let (status, _) = watch::channel(SaveStatus::Saved);
        let (transitions, _) = broadcast::channel(EVENT_CAPACITY);
        let (failures, _) = broadcast::channel(EVENT_CAPACITY);
        let (busy, _) = watch::channel(false);
        let (last_saved_at, _) = watch::channel(None);
        let (rejected, _) = watch::channel(None);
        Self {
            status,
            transitions,
            failures,
            busy,
            last_saved_at,
            revision: AtomicU64::new(0),
            rejected,
            in_flight: Mutex::new(()),
            debouncer: Debouncer::new(debounce),
            timeout,
        }
    }

    pub fn status(&self) -> SaveStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    /// Every status change, in order. Unlike `subscribe_status`, no
    /// intermediate state is skipped.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SaveStatus> {
        self.transitions.subscribe()
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<SaveFailure> {
        self.failures.subscribe()
    }

    /// True while a manual save is running.
    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.last_saved_at.borrow()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// True when the last save failed permanently (see
    /// [`SaveError::is_transient`]) and nothing has changed since, so saving
    /// again would fail the same way.
    pub fn is_rejected(&self) -> bool {
        matches!(*self.rejected.borrow(), Some(revision) if revision == self.revision())
    }

    /// Records that the document changed.
    pub fn mark_unsaved(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.set_status(SaveStatus::Unsaved);
    }

    /// (Re)starts the autosave timer. When it fires, `save` runs through
    /// [`execute_save`](Self::execute_save) as an autosave.
    pub fn schedule_debounced<F, Fut>(self: &Arc<Self>, save: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SaveError>> + Send + 'static,
    {
        let scheduler = Arc::clone(self);
        self.debouncer.schedule(move || async move {
            // Failures are already reported through `failures`; autosaves stay silent.
            let _ = scheduler.execute_save(SaveKind::Autosave, save).await;
        });
    }

    pub fn cancel_pending(&self) -> bool {
        self.debouncer.cancel()
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Runs one save, waiting first for any save already in flight.
    ///
    /// `save` is only invoked once the slot is held, so it reads the
    /// document as it is when the save actually starts.
    pub async fn execute_save<F, Fut, T>(&self, kind: SaveKind, save: F) -> Result<T, SaveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SaveError>>,
    {
        if self.is_in_flight() {
            debug!(?kind, "save already in flight; waiting");
        }
        let _slot = self.in_flight.lock().await;

        let _busy = BusyGuard(match kind {
            SaveKind::Manual => {
                self.busy.send_replace(true);
                Some(&self.busy)
            }
            SaveKind::Autosave => None,
        });
        let started_at = self.revision();
        self.set_status(SaveStatus::Saving);

        let attempt = save();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(SaveError::Timeout(limit)),
            },
            None => attempt.await,
        };

        match &result {
            Ok(_) => {
                self.rejected.send_replace(None);
                let now = Utc::now();
                self.last_saved_at.send_replace(Some(now));
                if self.revision() == started_at {
                    self.set_status(SaveStatus::Saved);
                    info!(?kind, revision = started_at, "resume saved");
                } else {
                    // Edits landed mid-save; their own debounced save will follow.
                    self.set_status(SaveStatus::Unsaved);
                    debug!(?kind, revision = started_at, "saved an older revision");
                }
            }
            Err(e) => {
                self.rejected
                    .send_replace((!e.is_transient()).then_some(started_at));
                self.set_status(SaveStatus::Unsaved);
                warn!(?kind, transient = e.is_transient(), "save failed: {e}");
                let _ = self.failures.send(SaveFailure {
                    kind,
                    notice: e.notice(),
                });
            }
        }
        result
    }

    fn set_status(&self, next: SaveStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            let _ = self.transitions.send(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RemoteError;
    use std::sync::atomic::AtomicUsize;

    fn drain(rx: &mut broadcast::Receiver<SaveStatus>) -> Vec<SaveStatus> {
        let mut seen = Vec::new();
        while let Ok(status) = rx.try_recv() {
            seen.push(status);
        }
        seen
    }

    fn remote_failure() -> SaveError {
        SaveError::Remote(RemoteError::Api {
            status: 500,
            message: "boom".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_save_transitions() {
        let scheduler = SaveScheduler::new(Duration::from_millis(1000), None);
        let mut rx = scheduler.subscribe_transitions();

        scheduler.mark_unsaved();
        scheduler
            .execute_save(SaveKind::Manual, || async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![SaveStatus::Unsaved, SaveStatus::Saving, SaveStatus::Saved]
        );
        assert!(scheduler.last_saved_at().is_some());
        assert!(!scheduler.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_transitions_and_reports() {
        let scheduler = SaveScheduler::new(Duration::from_millis(1000), None);
        let mut rx = scheduler.subscribe_transitions();
        let mut failures = scheduler.subscribe_failures();

        scheduler.mark_unsaved();
        let result = scheduler
            .execute_save(SaveKind::Autosave, || async { Err::<(), _>(remote_failure()) })
            .await;

        assert!(matches!(result, Err(SaveError::Remote(_))));
        assert_eq!(
            drain(&mut rx),
            vec![SaveStatus::Unsaved, SaveStatus::Saving, SaveStatus::Unsaved]
        );
        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.kind, SaveKind::Autosave);
        assert!(!failure.notice.actionable);
        assert!(scheduler.last_saved_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_rejected_until_next_edit() {
        let scheduler = SaveScheduler::new(Duration::from_millis(1000), None);
        scheduler.mark_unsaved();

        let _ = scheduler
            .execute_save(SaveKind::Autosave, || async {
                Err::<(), _>(SaveError::QuotaExceeded { size: 11, limit: 10 })
            })
            .await;
        assert!(scheduler.is_rejected());

        scheduler.mark_unsaved();
        assert!(!scheduler.is_rejected());

        let _ = scheduler
            .execute_save(SaveKind::Autosave, || async { Err::<(), _>(remote_failure()) })
            .await;
        assert!(!scheduler.is_rejected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_block_later_saves() {
        let scheduler = SaveScheduler::new(Duration::from_millis(1000), None);

        let _ = scheduler
            .execute_save(SaveKind::Manual, || async { Err::<(), _>(remote_failure()) })
            .await;
        assert!(!scheduler.is_in_flight());

        scheduler
            .execute_save(SaveKind::Manual, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(scheduler.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_save_executes() {
        let scheduler = Arc::new(SaveScheduler::new(Duration::from_millis(1000), None));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut clicks = Vec::new();
        for _ in 0..8 {
            let scheduler = Arc::clone(&scheduler);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let completed = Arc::clone(&completed);
            clicks.push(tokio::spawn(async move {
                scheduler
                    .execute_save(SaveKind::Manual, || async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for click in clicks {
            click.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 8);
        assert!(!scheduler.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_burst_executes_once() {
        let scheduler = Arc::new(SaveScheduler::new(Duration::from_millis(1000), None));
        let saves = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            scheduler.mark_unsaved();
            let saves = Arc::clone(&saves);
            scheduler.schedule_debounced(move || async move {
                saves.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(scheduler.has_pending());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(saves.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_save_keeps_unsaved() {
        let scheduler = Arc::new(SaveScheduler::new(Duration::from_millis(1000), None));
        scheduler.mark_unsaved();

        let editor = Arc::clone(&scheduler);
        scheduler
            .execute_save(SaveKind::Manual, || async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                editor.mark_unsaved();
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(scheduler.status(), SaveStatus::Unsaved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_slot() {
        let scheduler = SaveScheduler::new(Duration::from_millis(1000), Some(Duration::from_secs(5)));
        scheduler.mark_unsaved();

        let result = scheduler
            .execute_save(SaveKind::Manual, || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(SaveError::Timeout(_))));
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);
        assert!(!scheduler.is_in_flight());
        assert!(!scheduler.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_save_sets_busy_but_autosave_does_not() {
        let scheduler = SaveScheduler::new(Duration::from_millis(1000), None);
        let busy = scheduler.subscribe_busy();

        let observed = busy.clone();
        scheduler
            .execute_save(SaveKind::Autosave, || async move {
                assert!(!*observed.borrow());
                Ok(())
            })
            .await
            .unwrap();

        let observed = busy.clone();
        scheduler
            .execute_save(SaveKind::Manual, || async move {
                assert!(*observed.borrow());
                Ok(())
            })
            .await
            .unwrap();
        assert!(!*busy.borrow());
    }
}

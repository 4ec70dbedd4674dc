//! In-process doubles for the remote record API and the preview surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RemoteError;
use crate::models::Resume;
use crate::preview::{PreviewRequest, PreviewSurface};
use crate::remote::{CreatedRecord, RemoteResumeStore};
use crate::session::AuthToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { title: String },
    Update { id: i64, title: String },
}

/// Records every call, optionally sleeps to simulate latency, and tracks how
/// many calls overlap.
pub struct FakeRemote {
    calls: Mutex<Vec<Call>>,
    records: Mutex<HashMap<i64, Resume>>,
    next_id: AtomicI64,
    omit_ids: AtomicBool,
    failures_left: AtomicUsize,
    latency: Mutex<Duration>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            records: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            omit_ids: AtomicBool::new(false),
            failures_left: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_next_id(self, id: i64) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    pub fn without_ids(self) -> Self {
        self.omit_ids.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn with_record(self, id: i64, resume: Resume) -> Self {
        self.records.lock().unwrap().insert(id, resume);
        self
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn record(&self, id: i64) -> Option<Resume> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> Result<(), RemoteError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(RemoteError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteResumeStore for FakeRemote {
    async fn create(&self, _token: &AuthToken, resume: &Resume) -> Result<CreatedRecord, RemoteError> {
        self.enter(Call::Create {
            title: resume.title.clone(),
        })
        .await?;
        if self.omit_ids.load(Ordering::SeqCst) {
            return Ok(CreatedRecord { id: None });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().insert(id, resume.clone());
        Ok(CreatedRecord { id: Some(id) })
    }

    async fn update(&self, _token: &AuthToken, id: i64, resume: &Resume) -> Result<(), RemoteError> {
        self.enter(Call::Update {
            id,
            title: resume.title.clone(),
        })
        .await?;
        self.records.lock().unwrap().insert(id, resume.clone());
        Ok(())
    }

    async fn read(&self, _token: &AuthToken, id: i64) -> Result<Resume, RemoteError> {
        self.record(id).ok_or(RemoteError::Api {
            status: 404,
            message: "Resume not found".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    requests: Mutex<Vec<PreviewRequest>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PreviewRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<Resume> {
        self.requests()
            .iter()
            .map(|r| Resume::from_json(&r.resume_data).unwrap())
            .collect()
    }
}

impl PreviewSurface for RecordingSurface {
    fn dispatch(&self, request: PreviewRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

//! Registry of in-flight runs keyed by session id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::progress::Stage;
use crate::run::RunKind;

/// Point-in-time view of an active run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub session_id: String,
    pub kind: RunKind,
    pub stage: Stage,
    pub percent: f64,
    pub started_at: DateTime<Utc>,
}

type Entries = HashMap<String, Arc<Mutex<RunSnapshot>>>;

/// Shared registry. Cloning yields another handle onto the same entries.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry for `session_id`. Fails with `SessionBusy` if the
    /// session already has an active run. The entry is removed when the
    /// returned guard drops.
    pub fn register(&self, session_id: &str, kind: RunKind) -> SlidecastResult<RegistryGuard> {
        let mut entries = self.lock();
        if entries.contains_key(session_id) {
            return Err(SlidecastError::SessionBusy {
                session_id: session_id.to_string(),
            });
        }
        let snapshot = Arc::new(Mutex::new(RunSnapshot {
            session_id: session_id.to_string(),
            kind,
            stage: Stage::Initializing,
            percent: 0.0,
            started_at: Utc::now(),
        }));
        entries.insert(session_id.to_string(), snapshot.clone());
        tracing::debug!(session_id, %kind, active = entries.len(), "Run registered");
        Ok(RegistryGuard {
            entries: self.entries.clone(),
            session_id: session_id.to_string(),
            snapshot,
        })
    }

    /// Active runs, ordered by start time.
    pub fn active(&self) -> Vec<RunSnapshot> {
        let mut runs: Vec<RunSnapshot> = self
            .lock()
            .values()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        runs.sort_by_key(|s| s.started_at);
        runs
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration handle held by a running pipeline.
#[derive(Debug)]
pub struct RegistryGuard {
    entries: Arc<Mutex<Entries>>,
    session_id: String,
    snapshot: Arc<Mutex<RunSnapshot>>,
}

impl RegistryGuard {
    /// Shared snapshot the run's progress reporter writes into.
    pub fn snapshot(&self) -> Arc<Mutex<RunSnapshot>> {
        self.snapshot.clone()
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&self.session_id);
        tracing::debug!(session_id = %self.session_id, active = entries.len(), "Run unregistered");
    }
}

// crates/jobs/src/store.rs
//! Versioned job record store with per-record TTL.
//!
//! Records live behind [`KvBackend`], a compare-and-swap key-value trait. The
//! in-tree [`MemoryBackend`] covers a single process; a networked backend
//! implements the same three calls. Every mutation runs as a read-modify-CAS
//! loop, so concurrent writers interleave without losing updates, and the
//! state machine only ever moves forward: terminal records are immutable and
//! the progress percent never decreases.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::record::{ErrorInfo, JobRecord, JobStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job record not found: {0}")]
    NotFound(String),

    #[error("failed to encode job record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type Version = u64;

/// Key-value backend with per-key versions and TTL.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Version)>, StoreError>;

    /// Unconditional write. Resets the key's TTL and returns the new version.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<Version, StoreError>;

    /// Replace the key's value only if its current version is `expected`.
    /// `Ok(None)` means another writer got there first.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Version,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<Option<Version>, StoreError>;
}

struct Entry {
    value: Vec<u8>,
    version: Version,
    expires_at: Instant,
}

/// In-process [`KvBackend`] with lazy expiry.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Version)>, StoreError> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                Ok(Some((entry.value.clone(), entry.version)))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<Version, StoreError> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        let version = entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map_or(1, |e| e.version + 1);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                version,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(version)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Version,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<Option<Version>, StoreError> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > Instant::now() && entry.version == expected => {
                entry.value = value;
                entry.version += 1;
                entry.expires_at = Instant::now() + ttl;
                Ok(Some(entry.version))
            }
            _ => Ok(None),
        }
    }
}

/// Job record store. Cheap to clone; the backend is shared.
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(backend: Arc<dyn KvBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), ttl)
    }

    fn key(job_id: &str) -> String {
        format!("job:{job_id}")
    }

    /// Upsert a record. An existing record keeps its `created_at`;
    /// `updated_at` and `expires_at` always move to now and now-plus-TTL.
    pub async fn put(&self, record: &JobRecord) -> Result<(), StoreError> {
        let key = Self::key(&record.job_id);
        let mut record = record.clone();
        let now = Utc::now();
        if let Some((bytes, _)) = self.backend.get(&key).await? {
            let existing: JobRecord = serde_json::from_slice(&bytes)?;
            record.created_at = existing.created_at;
        }
        record.updated_at = now;
        record.expires_at = now + self.ttl;
        let encoded = serde_json::to_vec(&record)?;
        self.backend.put(&key, encoded, self.ttl).await?;
        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        let (bytes, _) = self
            .backend
            .get(&Self::key(job_id))
            .await?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read-modify-CAS loop. `apply` sees the freshest record on every
    /// attempt, so its guards (terminal check, percent max) hold under
    /// contention.
    async fn update_partial<F>(&self, job_id: &str, mut apply: F) -> Result<JobRecord, StoreError>
    where
        F: FnMut(&mut JobRecord),
    {
        let key = Self::key(job_id);
        loop {
            let (bytes, version) = self
                .backend
                .get(&key)
                .await?
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            let mut record: JobRecord = serde_json::from_slice(&bytes)?;
            apply(&mut record);
            let now = Utc::now();
            record.updated_at = now;
            record.expires_at = now + self.ttl;
            let encoded = serde_json::to_vec(&record)?;
            if self
                .backend
                .compare_and_swap(&key, version, encoded, self.ttl)
                .await?
                .is_some()
            {
                return Ok(record);
            }
        }
    }

    /// Move a non-terminal record to `running` and fold in a progress
    /// checkpoint. The stored percent only ever grows; a checkpoint below the
    /// current value is dropped whole.
    pub async fn update_progress(
        &self,
        job_id: &str,
        percent: u8,
        stage: Option<&str>,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        self.update_partial(job_id, |record| {
            if record.status.is_terminal() {
                return;
            }
            record.status = JobStatus::Running;
            if percent >= record.progress.percent {
                record.progress.percent = percent.min(100);
                if let Some(stage) = stage {
                    record.progress.stage = Some(stage.to_string());
                }
                record.progress.message = message.map(str::to_string);
            }
        })
        .await?;
        Ok(())
    }

    /// Terminal success: percent forced to 100, stage to `completed`, and the
    /// result surface attached. A no-op on an already-terminal record.
    pub async fn mark_done(
        &self,
        job_id: &str,
        download_url: impl Into<String>,
        meta: serde_json::Value,
    ) -> Result<(), StoreError> {
        let download_url = download_url.into();
        self.update_partial(job_id, |record| {
            if record.status.is_terminal() {
                return;
            }
            record.status = JobStatus::Done;
            record.progress.percent = 100;
            record.progress.stage = Some("completed".to_string());
            record.progress.message = None;
            record.error = None;
            record.download_url = Some(download_url.clone());
            record.meta = Some(meta.clone());
        })
        .await?;
        Ok(())
    }

    /// Terminal failure carrying the executor's error taxonomy. A no-op on an
    /// already-terminal record.
    pub async fn mark_failed(
        &self,
        job_id: &str,
        code: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        self.update_partial(job_id, |record| {
            if record.status.is_terminal() {
                return;
            }
            record.status = JobStatus::Error;
            record.error = Some(ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            });
        })
        .await?;
        Ok(())
    }
}

// crates/jobs/src/manager.rs
//! The job manager: owns the queue and worker pool and exposes the async
//! submission path.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use docsmith_core::{OpError, PreparedJob, Service};

use crate::queue::{self, TaskPayload, TaskQueue};
use crate::record::JobRecord;
use crate::store::{JobStore, StoreError};
use crate::worker;

pub struct JobManager {
    service: Arc<Service>,
    store: JobStore,
    queue: TaskQueue,
    shutdown: CancellationToken,
    pool: JoinHandle<()>,
}

impl JobManager {
    /// Spawn the worker pool and return the handle callers submit through.
    pub fn new(service: Arc<Service>, store: JobStore, concurrency: usize) -> Self {
        let (queue, rx) = queue::channel();
        let shutdown = CancellationToken::new();
        let pool = tokio::spawn(worker::run_pool(
            service.clone(),
            store.clone(),
            queue.clone(),
            rx,
            concurrency,
            shutdown.clone(),
        ));
        Self {
            service,
            store,
            queue,
            shutdown,
            pool,
        }
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Hand a prepared job to the background queue.
    ///
    /// The queued record is persisted before the task is published, so a
    /// caller polling right after submission always finds a record. If either
    /// step fails the workspace is discarded; a half-submitted job never
    /// lingers on disk.
    pub async fn enqueue(&self, prepared: &PreparedJob) -> Result<(), OpError> {
        let record = JobRecord::queued(&prepared.job_id, prepared.manifest.operation.as_str());
        if let Err(error) = self.store.put(&record).await {
            let _ = self.service.discard_job(&prepared.job_id).await;
            return Err(OpError::internal(format!(
                "failed to persist job record: {error}"
            )));
        }

        let payload = TaskPayload {
            job_id: prepared.job_id.clone(),
            operation: prepared.manifest.operation,
        };
        if self.queue.enqueue(payload).is_err() {
            let _ = self.service.discard_job(&prepared.job_id).await;
            let _ = self
                .store
                .mark_failed(&prepared.job_id, "INTERNAL_ERROR", "task queue is closed")
                .await;
            return Err(OpError::internal("task queue is closed"));
        }

        tracing::info!(
            job_id = %prepared.job_id,
            operation = %prepared.manifest.operation,
            "job enqueued"
        );
        Ok(())
    }

    pub async fn get_record(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        self.store.get(job_id).await
    }

    /// Stop accepting work and wait for the pool loop to exit. Tasks already
    /// running observe the cancellation through the service.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.pool.await;
    }
}

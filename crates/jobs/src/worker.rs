// crates/jobs/src/worker.rs
//! Bounded worker pool consuming the task queue.
//!
//! Each task runs the prepared job through the service, bridging executor
//! progress checkpoints into the record store and finishing with exactly one
//! terminal write. A task that fails with a retryable error is redelivered
//! once; everything else is final on the first pass.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use docsmith_core::progress::stage;
use docsmith_core::{ProgressFn, Service};

use crate::queue::{Delivery, TaskQueue};
use crate::store::JobStore;

/// First delivery plus one redelivery.
pub const MAX_ATTEMPTS: u32 = 2;

enum TaskDisposition {
    Completed,
    Redeliver,
}

/// Run the pool until the queue closes or `shutdown` fires. At most
/// `concurrency` tasks execute at once; the rest wait in the channel.
pub async fn run_pool(
    service: Arc<Service>,
    store: JobStore,
    queue: TaskQueue,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    concurrency: usize,
    shutdown: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = rx.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let service = service.clone();
        let store = store.clone();
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            let _permit = permit;
            if let TaskDisposition::Redeliver =
                handle_task(&service, &store, &delivery, &shutdown).await
            {
                let attempt = delivery.attempt + 1;
                tracing::warn!(
                    job_id = %delivery.payload.job_id,
                    attempt,
                    "redelivering failed task"
                );
                if queue.redeliver(delivery.payload, attempt).is_err() {
                    tracing::error!("task queue closed before redelivery");
                }
            }
        });
        // Reap finished handlers so the set does not grow with the backlog.
        while tasks.try_join_next().is_some() {}
    }
    // In-flight handlers finish their terminal record writes before the pool
    // reports stopped; a shutdown never strands a job in `running`.
    while tasks.join_next().await.is_some() {}
    tracing::info!("worker pool stopped");
}

async fn handle_task(
    service: &Service,
    store: &JobStore,
    delivery: &Delivery,
    shutdown: &CancellationToken,
) -> TaskDisposition {
    let job_id = delivery.payload.job_id.clone();
    tracing::info!(
        job_id = %job_id,
        operation = %delivery.payload.operation,
        attempt = delivery.attempt,
        "task started"
    );

    if let Err(error) = store
        .update_progress(&job_id, 0, Some(stage::LOAD), None)
        .await
    {
        // No record to report into; an orphaned payload is dropped here.
        tracing::error!(job_id = %job_id, %error, "failed to mark job running");
        return TaskDisposition::Completed;
    }

    // Executor checkpoints are synchronous; ship them through a channel and
    // apply them to the store in order from one forwarder task.
    let (tx, mut checkpoint_rx) = mpsc::unbounded_channel::<(String, u8)>();
    let forwarder = {
        let store = store.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move {
            while let Some((stage, percent)) = checkpoint_rx.recv().await {
                if let Err(error) = store
                    .update_progress(&job_id, percent, Some(&stage), None)
                    .await
                {
                    tracing::warn!(job_id = %job_id, %error, "progress update dropped");
                }
            }
        })
    };

    let progress = move |stage: &str, percent: u8| {
        let _ = tx.send((stage.to_string(), percent));
    };
    let outcome = service
        .run_job(&job_id, Some(&progress as &ProgressFn<'_>), shutdown)
        .await;
    drop(progress);
    // Every buffered checkpoint lands before the terminal write.
    let _ = forwarder.await;

    match outcome {
        Ok(result) => {
            let meta = serde_json::to_value(&result.meta).unwrap_or(serde_json::Value::Null);
            let download_url = format!("/api/jobs/{job_id}/download");
            if let Err(error) = store.mark_done(&job_id, download_url, meta).await {
                tracing::error!(job_id = %job_id, %error, "failed to record completion");
            }
            TaskDisposition::Completed
        }
        Err(err) => {
            if err.is_retryable() && delivery.attempt < MAX_ATTEMPTS {
                // The workspace survives a retryable failure; the record
                // stays running until the final attempt settles it.
                return TaskDisposition::Redeliver;
            }
            if let Err(error) = store
                .mark_failed(&job_id, err.code(), &err.to_string())
                .await
            {
                tracing::error!(job_id = %job_id, %error, "failed to record failure");
            }
            if err.is_retryable() {
                // Out of attempts; the workspace was kept for redelivery and
                // must go now.
                if let Err(error) = service.discard_job(&job_id).await {
                    tracing::warn!(job_id = %job_id, %error, "failed to discard workspace");
                }
            }
            TaskDisposition::Completed
        }
    }
}

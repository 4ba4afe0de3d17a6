// crates/jobs/src/queue.rs
//! In-process task queue.
//!
//! The payload is a serializable (job id, operation) pair, so an external
//! broker can carry the same contract; the channel is just the single-process
//! transport for it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use docsmith_core::OperationKind;

/// What travels through the queue. Everything else about the job is read
/// back from its manifest by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub job_id: String,
    pub operation: OperationKind,
}

/// A payload plus its 1-based delivery attempt.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: TaskPayload,
    pub attempt: u32,
}

#[derive(Debug, Error)]
#[error("task queue is closed")]
pub struct QueueClosed;

/// Producer half of the queue.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Build a queue and its consumer half.
pub fn channel() -> (TaskQueue, mpsc::UnboundedReceiver<Delivery>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskQueue { tx }, rx)
}

impl TaskQueue {
    pub fn enqueue(&self, payload: TaskPayload) -> Result<(), QueueClosed> {
        self.tx
            .send(Delivery {
                payload,
                attempt: 1,
            })
            .map_err(|_| QueueClosed)
    }

    pub(crate) fn redeliver(&self, payload: TaskPayload, attempt: u32) -> Result<(), QueueClosed> {
        self.tx
            .send(Delivery { payload, attempt })
            .map_err(|_| QueueClosed)
    }
}

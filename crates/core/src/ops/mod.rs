// crates/core/src/ops/mod.rs
//! Operation executors and the shared execute-phase plumbing.
//!
//! Each operation module exposes a single `run` that reads staged inputs,
//! writes the fixed-name artifact into `out/`, and returns the result
//! metadata. Everything the executors share lives here: the meta side file,
//! output promotion, order validation, and delayed workspace cleanup.

pub(crate) mod combine;
pub(crate) mod compress;
pub(crate) mod extract;
pub(crate) mod reorder;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::engine::{Compressor, DocEngine};
use crate::error::OpError;
use crate::manifest::{Manifest, OperationKind, StagedFile};
use crate::progress::{report, stage, ProgressFn};
use crate::result::{output_spec, OpResult, ResultMeta};
use crate::workspace::{remove_workspace, Workspace};

pub(crate) const META_FILENAME: &str = "meta.json";

/// The meta side file written next to the manifest once execution succeeds.
/// Its presence is what marks a job as finished on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SideMeta {
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub meta: ResultMeta,
}

/// Execute a prepared job against its manifest.
pub(crate) async fn run_operation(
    engine: &dyn DocEngine,
    compressor: &dyn Compressor,
    ws: &Workspace,
    manifest: &Manifest,
    progress: Option<&ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<OpResult, OpError> {
    if cancel.is_cancelled() {
        return Err(OpError::Cancelled);
    }

    let meta = match manifest.operation {
        OperationKind::Combine => combine::run(engine, ws, manifest, progress, cancel).await?,
        OperationKind::Reorder => reorder::run(engine, ws, manifest, progress, cancel).await?,
        OperationKind::Extract => extract::run(engine, ws, manifest, progress, cancel).await?,
        OperationKind::Compress => compress::run(compressor, ws, manifest, progress, cancel).await?,
    };

    let (filename, kind) = output_spec(manifest.operation);
    let output_path = ws.out_dir.join(filename);
    let output_bytes = output_size(&output_path).await?;
    write_side_meta(ws, &meta).await?;
    report(progress, stage::COMPLETED, 100);

    Ok(OpResult {
        job_id: ws.job_id.clone(),
        operation: manifest.operation,
        output_path,
        output_filename: filename.to_string(),
        output_bytes,
        kind,
        meta,
    })
}

/// The single staged input of a one-file operation.
pub(crate) fn single_file(manifest: &Manifest) -> Result<&StagedFile, OpError> {
    match manifest.files.as_slice() {
        [file] => Ok(file),
        files => Err(OpError::invalid_input(format!(
            "{} expects exactly one input file (manifest has {})",
            manifest.operation,
            files.len()
        ))),
    }
}

/// Check that `order` is a permutation of `0..expected_len`.
pub(crate) fn validate_order(
    order: &[usize],
    expected_len: usize,
    what: &str,
) -> Result<(), OpError> {
    if order.len() != expected_len {
        return Err(OpError::invalid_input(format!(
            "{what} has {} entries but {expected_len} are required",
            order.len()
        )));
    }
    let mut seen = vec![false; expected_len];
    for &index in order {
        if index >= expected_len {
            return Err(OpError::invalid_input(format!(
                "{what} index {index} is out of range (0-{})",
                expected_len.saturating_sub(1)
            )));
        }
        if seen[index] {
            return Err(OpError::invalid_input(format!(
                "{what} repeats index {index}"
            )));
        }
        seen[index] = true;
    }
    Ok(())
}

/// Executors write to `<final>.partial` and promote on success, so a crashed
/// or failed run never leaves a well-named artifact behind.
pub(crate) fn partial_path(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_owned();
    os.push(".partial");
    PathBuf::from(os)
}

pub(crate) async fn promote(partial: &Path, final_path: &Path) -> Result<(), OpError> {
    tokio::fs::rename(partial, final_path)
        .await
        .map_err(|e| OpError::io(final_path, e))
}

pub(crate) async fn output_size(path: &Path) -> Result<u64, OpError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| OpError::io(path, e))?;
    Ok(meta.len())
}

pub(crate) async fn write_side_meta(ws: &Workspace, meta: &ResultMeta) -> Result<(), OpError> {
    let side = SideMeta {
        created_at: Utc::now(),
        meta: meta.clone(),
    };
    let path = ws.meta_path();
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_vec_pretty(&side)
        .map_err(|e| OpError::internal(format!("failed to encode result meta: {e}")))?;
    tokio::fs::write(&tmp, payload)
        .await
        .map_err(|e| OpError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(|e| OpError::io(&path, e))
}

/// A missing meta file means the job has not finished (or is gone), which
/// maps to [`OpError::NotFound`] for result access.
pub(crate) async fn load_side_meta(ws: &Workspace) -> Result<SideMeta, OpError> {
    let path = ws.meta_path();
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OpError::NotFound(ws.job_id.clone()))
        }
        Err(e) => return Err(OpError::io(&path, e)),
    };
    serde_json::from_slice(&data).map_err(|e| {
        OpError::internal(format!("failed to parse result meta for {}: {e}", ws.job_id))
    })
}

/// Arm the delayed cleanup for a finished job. The timer holds no handle to
/// the job beyond its id, so a workspace discarded earlier makes this a no-op.
pub(crate) fn schedule_cleanup(work_root: PathBuf, job_id: String, ttl: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        match remove_workspace(&work_root, &job_id).await {
            Ok(()) => tracing::debug!(job_id = %job_id, "workspace removed after ttl"),
            Err(error) => {
                tracing::warn!(job_id = %job_id, %error, "delayed workspace cleanup failed")
            }
        }
    });
}

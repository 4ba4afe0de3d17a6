// crates/core/src/service.rs
//! The orchestration facade: prepare, execute, result access, and discard.
//!
//! Preparation and execution are deliberately split. `prepare_*` validates,
//! stages inputs, and persists the manifest; `run_job` reads the manifest
//! back and executes it. The split is what lets a prepared job run inline in
//! the calling task or later on a worker, with identical semantics.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::CoreConfig;
use crate::dispatch::should_run_async;
use crate::engine::{Compressor, DocEngine, GhostscriptCompressor};
use crate::error::OpError;
use crate::manifest::{
    load_manifest, write_manifest, CompressPreset, Manifest, OperationKind, StagedFile,
};
use crate::ops;
use crate::progress::ProgressFn;
use crate::result::{output_spec, OpResult, SourceFileMeta};
use crate::staging::{stage_inputs, InputFile};
use crate::workspace::{create_workspace, remove_workspace, workspace_for, Workspace};

/// Outcome of a successful prepare phase.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub job_id: String,
    /// True when the job crossed a dispatch threshold and should be handed to
    /// the background queue instead of running inline.
    pub run_async: bool,
    pub manifest: Manifest,
}

/// Job orchestration service. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct Service {
    cfg: CoreConfig,
    engine: Arc<dyn DocEngine>,
    compressor: Arc<dyn Compressor>,
}

impl Service {
    pub fn new(
        cfg: CoreConfig,
        engine: Arc<dyn DocEngine>,
        compressor: Arc<dyn Compressor>,
    ) -> Self {
        Self {
            cfg,
            engine,
            compressor,
        }
    }

    /// Build a service whose compressor shells out to the Ghostscript binary
    /// named in the configuration.
    pub fn with_ghostscript(cfg: CoreConfig, engine: Arc<dyn DocEngine>) -> Self {
        let compressor = Arc::new(GhostscriptCompressor::new(&cfg.ghostscript_path));
        Self::new(cfg, engine, compressor)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Prepare a combine job. `order` permutes the inputs by index; `None`
    /// keeps upload order.
    pub async fn prepare_combine(
        &self,
        inputs: &[InputFile],
        order: Option<Vec<usize>>,
        cancel: &CancellationToken,
    ) -> Result<PreparedJob, OpError> {
        if inputs.len() < 2 {
            return Err(OpError::invalid_input(
                "combine requires at least two input files",
            ));
        }
        // Validated before any file is staged, so a bad order costs nothing.
        if let Some(order) = &order {
            ops::validate_order(order, inputs.len(), "file order")?;
        }
        let (ws, staged) = self.stage(inputs, cancel).await?;
        self.finish_prepare(ws, OperationKind::Combine, staged, order, None, None)
            .await
    }

    /// Prepare a reorder job. `order` is a permutation of the document's
    /// 0-based page indices, validated against the real page count.
    pub async fn prepare_reorder(
        &self,
        input: InputFile,
        order: Vec<usize>,
        cancel: &CancellationToken,
    ) -> Result<PreparedJob, OpError> {
        let (ws, staged) = self.stage(std::slice::from_ref(&input), cancel).await?;
        if let Err(err) = ops::validate_order(&order, staged[0].page_count as usize, "page order")
        {
            self.scrap(&ws).await;
            return Err(err);
        }
        self.finish_prepare(ws, OperationKind::Reorder, staged, Some(order), None, None)
            .await
    }

    /// Prepare an extract job. The raw range expression is validated against
    /// the staged document and stored verbatim in the manifest.
    pub async fn prepare_extract(
        &self,
        input: InputFile,
        ranges: &str,
        cancel: &CancellationToken,
    ) -> Result<PreparedJob, OpError> {
        if ranges.trim().is_empty() {
            return Err(OpError::invalid_input("page range expression is empty"));
        }
        let (ws, staged) = self.stage(std::slice::from_ref(&input), cancel).await?;
        if let Err(err) = crate::ranges::parse_page_ranges(ranges, staged[0].page_count) {
            self.scrap(&ws).await;
            return Err(err);
        }
        self.finish_prepare(
            ws,
            OperationKind::Extract,
            staged,
            None,
            Some(ranges.trim().to_string()),
            None,
        )
        .await
    }

    pub async fn prepare_compress(
        &self,
        input: InputFile,
        preset: CompressPreset,
        cancel: &CancellationToken,
    ) -> Result<PreparedJob, OpError> {
        let (ws, staged) = self.stage(std::slice::from_ref(&input), cancel).await?;
        self.finish_prepare(
            ws,
            OperationKind::Compress,
            staged,
            None,
            None,
            Some(preset),
        )
        .await
    }

    /// Execute a prepared job to completion.
    ///
    /// On success the workspace outlives the call by the configured TTL so
    /// the result stays downloadable, then the delayed cleanup removes it.
    /// A non-retryable failure removes the workspace immediately; a retryable
    /// one leaves it in place for a redelivery to pick up.
    pub async fn run_job(
        &self,
        job_id: &str,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<OpResult, OpError> {
        let ws = workspace_for(&self.cfg.work_root, job_id)?;
        let manifest = load_manifest(&ws).await?;

        match ops::run_operation(
            self.engine.as_ref(),
            self.compressor.as_ref(),
            &ws,
            &manifest,
            progress,
            cancel,
        )
        .await
        {
            Ok(result) => {
                ops::schedule_cleanup(
                    self.cfg.work_root.clone(),
                    job_id.to_string(),
                    self.cfg.job_ttl,
                );
                tracing::info!(
                    job_id = %job_id,
                    operation = %manifest.operation,
                    output_bytes = result.output_bytes,
                    "job completed"
                );
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(
                    job_id = %job_id,
                    operation = %manifest.operation,
                    code = err.code(),
                    error = %err,
                    "job failed"
                );
                if !err.is_retryable() {
                    self.scrap(&ws).await;
                }
                Err(err)
            }
        }
    }

    /// Open a finished job's artifact for download. Fails with `NotFound`
    /// until the job has completed, and again once cleanup has removed it.
    pub async fn open_result(&self, job_id: &str) -> Result<OpResult, OpError> {
        let ws = workspace_for(&self.cfg.work_root, job_id)?;
        let manifest = load_manifest(&ws).await?;
        let side = ops::load_side_meta(&ws).await?;

        let (filename, kind) = output_spec(manifest.operation);
        let output_path = ws.out_dir.join(filename);
        let output_bytes = match tokio::fs::metadata(&output_path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OpError::NotFound(job_id.to_string()))
            }
            Err(e) => return Err(OpError::io(&output_path, e)),
        };

        Ok(OpResult {
            job_id: job_id.to_string(),
            operation: manifest.operation,
            output_path,
            output_filename: filename.to_string(),
            output_bytes,
            kind,
            meta: side.meta,
        })
    }

    /// Load a job's manifest, for status surfaces that need the staged shape.
    pub async fn inspect(&self, job_id: &str) -> Result<Manifest, OpError> {
        let ws = workspace_for(&self.cfg.work_root, job_id)?;
        load_manifest(&ws).await
    }

    /// Inspect one uploaded document without creating a durable job: stage it
    /// through the normal validation into a throwaway workspace, report its
    /// shape, and remove the workspace before returning.
    pub async fn inspect_input(
        &self,
        input: InputFile,
        cancel: &CancellationToken,
    ) -> Result<SourceFileMeta, OpError> {
        let (ws, staged) = self.stage(std::slice::from_ref(&input), cancel).await?;
        let meta = SourceFileMeta::from(&staged[0]);
        self.scrap(&ws).await;
        Ok(meta)
    }

    /// Remove a job's workspace now, ahead of its TTL.
    pub async fn discard_job(&self, job_id: &str) -> Result<(), OpError> {
        remove_workspace(&self.cfg.work_root, job_id).await?;
        tracing::info!(job_id = %job_id, "workspace discarded");
        Ok(())
    }

    async fn stage(
        &self,
        inputs: &[InputFile],
        cancel: &CancellationToken,
    ) -> Result<(Workspace, Vec<StagedFile>), OpError> {
        let ws = create_workspace(&self.cfg.work_root).await?;
        match stage_inputs(self.engine.as_ref(), &ws, inputs, &self.cfg, cancel).await {
            Ok(staged) => Ok((ws, staged)),
            Err(err) => {
                self.scrap(&ws).await;
                Err(err)
            }
        }
    }

    async fn finish_prepare(
        &self,
        ws: Workspace,
        operation: OperationKind,
        staged: Vec<StagedFile>,
        order: Option<Vec<usize>>,
        ranges: Option<String>,
        preset: Option<CompressPreset>,
    ) -> Result<PreparedJob, OpError> {
        let manifest = Manifest {
            job_id: ws.job_id.clone(),
            operation,
            files: staged,
            order,
            ranges,
            preset,
            created_at: Utc::now(),
        };
        if let Err(err) = write_manifest(&ws, &manifest).await {
            self.scrap(&ws).await;
            return Err(err);
        }

        let run_async = should_run_async(&manifest, &self.cfg.thresholds);
        tracing::info!(
            job_id = %ws.job_id,
            operation = %operation,
            total_bytes = manifest.total_bytes(),
            total_pages = manifest.total_pages(),
            run_async,
            "job prepared"
        );
        Ok(PreparedJob {
            job_id: ws.job_id,
            run_async,
            manifest,
        })
    }

    async fn scrap(&self, ws: &Workspace) {
        if let Err(error) = remove_workspace(&self.cfg.work_root, &ws.job_id).await {
            tracing::warn!(job_id = %ws.job_id, %error, "failed to remove rejected workspace");
        }
    }
}

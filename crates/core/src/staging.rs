// crates/core/src/staging.rs
//! Input staging: copy caller-provided files into a job's `in/` directory,
//! enforcing size ceilings and rejecting anything that does not sniff as a
//! PDF. The declared filename is never trusted; only the leading magic bytes
//! decide.

use std::path::PathBuf;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::config::CoreConfig;
use crate::engine::DocEngine;
use crate::error::OpError;
use crate::manifest::StagedFile;
use crate::workspace::Workspace;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// One caller-provided input: the upload's original name plus the spool file
/// the transport layer already wrote it to.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub path: PathBuf,
}

impl InputFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Stage all inputs of one job, in upload order.
///
/// Honors the cancellation signal between files; a cancelled or failed
/// staging leaves cleanup to the caller, which owns the workspace.
pub async fn stage_inputs(
    engine: &dyn DocEngine,
    ws: &Workspace,
    inputs: &[InputFile],
    cfg: &CoreConfig,
    cancel: &CancellationToken,
) -> Result<Vec<StagedFile>, OpError> {
    if inputs.is_empty() {
        return Err(OpError::invalid_input("no input files were provided"));
    }

    let mut staged = Vec::with_capacity(inputs.len());
    let mut total_bytes = 0u64;

    for (index, input) in inputs.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(OpError::Cancelled);
        }

        let file = stage_one(engine, ws, input, index, cfg).await?;
        total_bytes += file.size_bytes;
        if total_bytes > cfg.max_total_bytes {
            return Err(OpError::limit_exceeded(format!(
                "combined input size exceeds the {} byte ceiling",
                cfg.max_total_bytes
            )));
        }
        staged.push(file);
    }

    Ok(staged)
}

async fn stage_one(
    engine: &dyn DocEngine,
    ws: &Workspace,
    input: &InputFile,
    index: usize,
    cfg: &CoreConfig,
) -> Result<StagedFile, OpError> {
    let meta = tokio::fs::metadata(&input.path)
        .await
        .map_err(|e| OpError::io(&input.path, e))?;
    if meta.len() > cfg.max_file_bytes {
        return Err(OpError::limit_exceeded(format!(
            "{} is {} bytes, above the {} byte per-file ceiling",
            input.name,
            meta.len(),
            cfg.max_file_bytes
        )));
    }

    sniff_pdf(input).await?;

    let stored_name = format!("input-{:02}.pdf", index + 1);
    let stored_path = ws.in_dir.join(&stored_name);
    tokio::fs::copy(&input.path, &stored_path)
        .await
        .map_err(|e| OpError::io(&stored_path, e))?;

    let page_count = engine.page_count(&stored_path).await?;
    if page_count == 0 {
        return Err(OpError::unsupported(format!("{} has no pages", input.name)));
    }
    if page_count > cfg.max_pages {
        return Err(OpError::limit_exceeded(format!(
            "{} has {page_count} pages, above the {} page ceiling",
            input.name, cfg.max_pages
        )));
    }

    Ok(StagedFile {
        stored_name,
        original_name: input.name.clone(),
        size_bytes: meta.len(),
        page_count,
    })
}

async fn sniff_pdf(input: &InputFile) -> Result<(), OpError> {
    let mut file = tokio::fs::File::open(&input.path)
        .await
        .map_err(|e| OpError::io(&input.path, e))?;
    let mut magic = [0u8; 5];
    let mut read = 0;
    while read < magic.len() {
        let n = file
            .read(&mut magic[read..])
            .await
            .map_err(|e| OpError::io(&input.path, e))?;
        if n == 0 {
            break;
        }
        read += n;
    }
    if &magic[..read] != PDF_MAGIC {
        return Err(OpError::unsupported(format!(
            "{} does not look like a PDF document",
            input.name
        )));
    }
    Ok(())
}

// crates/core/src/engine.rs
//! Collaborator traits for the document transformation primitives, plus the
//! Ghostscript subprocess compressor.
//!
//! The orchestration core never touches PDF internals itself: page selection
//! and concatenation go through [`DocEngine`], compression through
//! [`Compressor`]. Both are fixed trait signatures chosen at build time; an
//! adapter implements them for whatever library or tool is linked.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::OpError;
use crate::manifest::CompressPreset;

/// Document manipulation primitive operating on staged local files.
#[async_trait]
pub trait DocEngine: Send + Sync {
    /// Number of pages in the document at `source`.
    async fn page_count(&self, source: &Path) -> Result<u32, OpError>;

    /// Write a new document at `output` containing exactly the given 1-based
    /// pages of `source`, renumbered in the order given.
    async fn collect_pages(
        &self,
        source: &Path,
        output: &Path,
        pages: &[u32],
    ) -> Result<(), OpError>;

    /// Concatenate `inputs` in order into a single document at `output`.
    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<(), OpError>;
}

/// Compression collaborator. The production implementation shells out to an
/// external tool; test doubles stay in-process.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        preset: CompressPreset,
        cancel: &CancellationToken,
    ) -> Result<(), OpError>;
}

/// Ghostscript-backed [`Compressor`] running `gs` as a blocking subprocess.
pub struct GhostscriptCompressor {
    binary: PathBuf,
}

impl GhostscriptCompressor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Compressor for GhostscriptCompressor {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        preset: CompressPreset,
        cancel: &CancellationToken,
    ) -> Result<(), OpError> {
        let mut child = Command::new(&self.binary)
            .args(ghostscript_args(output, input, preset))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OpError::internal(format!(
                    "failed to spawn {}: {e}",
                    self.binary.display()
                ))
            })?;

        // Drain stderr concurrently so a chatty tool cannot deadlock the pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                stderr_task.abort();
                return Err(OpError::Cancelled);
            }
            status = child.wait() => status
                .map_err(|e| OpError::internal(format!("failed to wait for ghostscript: {e}")))?,
        };

        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(OpError::unsupported(format!(
                "ghostscript exited with {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn ghostscript_args(output: &Path, input: &Path, preset: CompressPreset) -> Vec<String> {
    let setting = match preset {
        CompressPreset::Standard => "/printer",
        CompressPreset::Aggressive => "/screen",
    };
    vec![
        "-sDEVICE=pdfwrite".to_string(),
        "-dCompatibilityLevel=1.5".to_string(),
        "-dNOPAUSE".to_string(),
        "-dQUIET".to_string(),
        "-dBATCH".to_string(),
        format!("-dPDFSETTINGS={setting}"),
        format!("-sOutputFile={}", output.display()),
        input.display().to_string(),
    ]
}

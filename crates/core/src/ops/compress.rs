// crates/core/src/ops/compress.rs
//! Compress: rewrite a single document through the compressor at the
//! requested preset and report how many bytes it saved.

use tokio_util::sync::CancellationToken;

use crate::engine::Compressor;
use crate::error::OpError;
use crate::manifest::Manifest;
use crate::progress::{report, stage, ProgressFn};
use crate::result::{saved_percent, ResultMeta};
use crate::workspace::Workspace;

use super::{output_size, partial_path, promote, single_file};

pub(crate) async fn run(
    compressor: &dyn Compressor,
    ws: &Workspace,
    manifest: &Manifest,
    progress: Option<&ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ResultMeta, OpError> {
    let file = single_file(manifest)?;
    let preset = manifest.preset.unwrap_or_default();

    report(progress, stage::PROCESS, 40);

    let source = ws.in_dir.join(&file.stored_name);
    let final_path = ws.out_dir.join("compressed.pdf");
    let partial = partial_path(&final_path);
    compressor
        .compress(&source, &partial, preset, cancel)
        .await?;

    report(progress, stage::WRITE, 80);
    let output_bytes = output_size(&partial).await?;
    promote(&partial, &final_path).await?;

    Ok(ResultMeta::Compress {
        original_bytes: file.size_bytes,
        output_bytes,
        saved_bytes: file.size_bytes as i64 - output_bytes as i64,
        saved_percent: saved_percent(file.size_bytes, output_bytes),
        preset,
        source: file.into(),
    })
}

// crates/core/src/ops/extract.rs
//! Extract: cut the requested page ranges into per-range documents and pack
//! them into one zip archive.

use tokio_util::sync::CancellationToken;

use crate::archive::{build_zip, ZipEntry};
use crate::engine::DocEngine;
use crate::error::OpError;
use crate::manifest::Manifest;
use crate::progress::{report, stage, ProgressFn};
use crate::ranges::parse_page_ranges;
use crate::result::{ExtractPart, ResultMeta};
use crate::workspace::Workspace;

use super::{output_size, partial_path, promote, single_file};

pub(crate) async fn run(
    engine: &dyn DocEngine,
    ws: &Workspace,
    manifest: &Manifest,
    progress: Option<&ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ResultMeta, OpError> {
    let file = single_file(manifest)?;
    let expr = manifest
        .ranges
        .as_deref()
        .ok_or_else(|| OpError::invalid_input("extract requires a page range expression"))?;
    let ranges = parse_page_ranges(expr, file.page_count)?;

    let source = ws.in_dir.join(&file.stored_name);
    let total = ranges.len();
    let mut parts = Vec::with_capacity(total);
    let mut entries = Vec::with_capacity(total);

    for (i, range) in ranges.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(OpError::Cancelled);
        }

        let filename = format!("part-{:02}.pdf", i + 1);
        let part_path = ws.out_dir.join(&filename);
        let pages: Vec<u32> = range.pages().collect();
        engine.collect_pages(&source, &part_path, &pages).await?;

        parts.push(ExtractPart {
            filename: filename.clone(),
            from_page: range.start,
            to_page: range.end,
            page_count: range.page_count(),
            size_bytes: output_size(&part_path).await?,
        });
        entries.push(ZipEntry {
            name: filename,
            path: part_path,
        });

        // Progress walks 20 toward 80 as parts land.
        let percent = 20 + (60 * (i + 1) / total) as u8;
        report(progress, stage::PROCESS, percent);
    }

    let final_path = ws.out_dir.join("extract.zip");
    let partial = partial_path(&final_path);
    build_zip(entries, partial.clone()).await?;

    report(progress, stage::WRITE, 90);
    promote(&partial, &final_path).await?;

    Ok(ResultMeta::Extract {
        source: file.into(),
        ranges,
        parts,
    })
}

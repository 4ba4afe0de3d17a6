// crates/core/src/ops/reorder.rs
//! Reorder: rewrite a single document with its pages permuted.

use tokio_util::sync::CancellationToken;

use crate::engine::DocEngine;
use crate::error::OpError;
use crate::manifest::Manifest;
use crate::progress::{report, stage, ProgressFn};
use crate::result::ResultMeta;
use crate::workspace::Workspace;

use super::{partial_path, promote, single_file, validate_order};

pub(crate) async fn run(
    engine: &dyn DocEngine,
    ws: &Workspace,
    manifest: &Manifest,
    progress: Option<&ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ResultMeta, OpError> {
    let file = single_file(manifest)?;
    let order = manifest
        .order
        .as_ref()
        .ok_or_else(|| OpError::invalid_input("reorder requires a page order"))?;
    validate_order(order, file.page_count as usize, "page order")?;

    if cancel.is_cancelled() {
        return Err(OpError::Cancelled);
    }
    report(progress, stage::PROCESS, 40);

    // Order entries are 0-based page indices; the engine takes 1-based pages.
    let pages: Vec<u32> = order.iter().map(|&i| i as u32 + 1).collect();
    let source = ws.in_dir.join(&file.stored_name);
    let final_path = ws.out_dir.join("reordered.pdf");
    let partial = partial_path(&final_path);
    engine.collect_pages(&source, &partial, &pages).await?;

    report(progress, stage::WRITE, 80);
    promote(&partial, &final_path).await?;

    Ok(ResultMeta::Reorder {
        source: file.into(),
        order: order.clone(),
    })
}

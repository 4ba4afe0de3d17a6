// crates/core/src/ops/combine.rs
//! Combine: concatenate every staged input into one document.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::engine::DocEngine;
use crate::error::OpError;
use crate::manifest::Manifest;
use crate::progress::{report, stage, ProgressFn};
use crate::result::ResultMeta;
use crate::workspace::Workspace;

use super::{partial_path, promote, validate_order};

pub(crate) async fn run(
    engine: &dyn DocEngine,
    ws: &Workspace,
    manifest: &Manifest,
    progress: Option<&ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ResultMeta, OpError> {
    report(progress, stage::LOAD, 20);

    // Order defaults to upload order; a manifest edited by hand is still
    // required to carry a valid permutation.
    let order: Vec<usize> = match &manifest.order {
        Some(order) => {
            validate_order(order, manifest.files.len(), "file order")?;
            order.clone()
        }
        None => (0..manifest.files.len()).collect(),
    };
    let inputs: Vec<PathBuf> = order
        .iter()
        .map(|&i| ws.in_dir.join(&manifest.files[i].stored_name))
        .collect();

    if cancel.is_cancelled() {
        return Err(OpError::Cancelled);
    }
    report(progress, stage::PROCESS, 60);

    let final_path = ws.out_dir.join("combined.pdf");
    let partial = partial_path(&final_path);
    engine.concatenate(&inputs, &partial).await?;

    report(progress, stage::WRITE, 90);
    promote(&partial, &final_path).await?;

    Ok(ResultMeta::Combine {
        total_pages: manifest.total_pages(),
        sources: manifest.files.iter().map(Into::into).collect(),
    })
}

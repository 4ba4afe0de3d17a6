// crates/core/src/result.rs
//! Result types produced by the executors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::manifest::{CompressPreset, OperationKind, StagedFile};
use crate::ranges::PageRange;

/// What kind of artifact an operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Pdf,
    Zip,
}

impl ResultKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
        }
    }
}

/// Fixed output filename and artifact kind per operation.
pub fn output_spec(operation: OperationKind) -> (&'static str, ResultKind) {
    match operation {
        OperationKind::Combine => ("combined.pdf", ResultKind::Pdf),
        OperationKind::Reorder => ("reordered.pdf", ResultKind::Pdf),
        OperationKind::Extract => ("extract.zip", ResultKind::Zip),
        OperationKind::Compress => ("compressed.pdf", ResultKind::Pdf),
    }
}

/// Caller-facing metadata about one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFileMeta {
    pub name: String,
    pub size_bytes: u64,
    pub page_count: u32,
}

impl From<&StagedFile> for SourceFileMeta {
    fn from(file: &StagedFile) -> Self {
        Self {
            name: file.original_name.clone(),
            size_bytes: file.size_bytes,
            page_count: file.page_count,
        }
    }
}

/// One part of an extract archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractPart {
    pub filename: String,
    pub from_page: u32,
    pub to_page: u32,
    pub page_count: u32,
    pub size_bytes: u64,
}

/// Operation-specific result details, persisted as the job's meta side file
/// and surfaced to polling callers verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResultMeta {
    #[serde(rename_all = "camelCase")]
    Combine {
        total_pages: u64,
        sources: Vec<SourceFileMeta>,
    },
    #[serde(rename_all = "camelCase")]
    Reorder {
        source: SourceFileMeta,
        order: Vec<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Extract {
        source: SourceFileMeta,
        ranges: Vec<PageRange>,
        parts: Vec<ExtractPart>,
    },
    #[serde(rename_all = "camelCase")]
    Compress {
        original_bytes: u64,
        output_bytes: u64,
        saved_bytes: i64,
        saved_percent: f64,
        preset: CompressPreset,
        source: SourceFileMeta,
    },
}

/// A completed operation's output: the artifact plus its metadata. The
/// backing file is owned by the job's workspace and is deleted with it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpResult {
    pub job_id: String,
    pub operation: OperationKind,
    pub output_path: PathBuf,
    pub output_filename: String,
    pub output_bytes: u64,
    pub kind: ResultKind,
    pub meta: ResultMeta,
}

/// Percent saved by compression; guarded against an empty source.
pub fn saved_percent(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (before as f64 - after as f64) / before as f64 * 100.0
}

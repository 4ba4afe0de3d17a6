// crates/core/src/manifest.rs
//! The durable job manifest.
//!
//! Written once at prepare time, read once at execute time, immutable in
//! between. The manifest is the only link between the prepare and execute
//! phases, which is what lets a job be prepared in one request and executed
//! later by a worker in another task (or another process).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OpError;
use crate::workspace::Workspace;

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// The closed set of operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Combine,
    Reorder,
    Extract,
    Compress,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combine => "combine",
            Self::Reorder => "reorder",
            Self::Extract => "extract",
            Self::Compress => "compress",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression preset for the compress operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressPreset {
    #[default]
    Standard,
    Aggressive,
}

impl FromStr for CompressPreset {
    type Err = OpError;

    /// Parse a preset name; the empty string selects the default.
    fn from_str(s: &str) -> Result<Self, OpError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standard" => Ok(Self::Standard),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(OpError::invalid_input(format!(
                "preset must be \"standard\" or \"aggressive\" (received: {other})"
            ))),
        }
    }
}

/// Metadata for one staged input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFile {
    /// Name inside the workspace's `in/` directory.
    pub stored_name: String,
    /// Name the caller uploaded the file under.
    pub original_name: String,
    pub size_bytes: u64,
    pub page_count: u32,
}

/// Everything a worker needs to execute a prepared job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub job_id: String,
    pub operation: OperationKind,
    pub files: Vec<StagedFile>,
    /// Combine: permutation over file indices. Reorder: permutation over
    /// 0-based page indices of the single input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<usize>>,
    /// Raw range expression for extract, reparsed at execute time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<CompressPreset>,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn total_pages(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.page_count)).sum()
    }
}

/// Persist the manifest atomically: write a sibling temp file, then rename
/// over the final path. A crash in between leaves the job without a manifest,
/// which callers must treat as "job does not exist" — never a torn file.
pub async fn write_manifest(ws: &Workspace, manifest: &Manifest) -> Result<(), OpError> {
    let path = ws.manifest_path();
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_vec_pretty(manifest)
        .map_err(|e| OpError::internal(format!("failed to encode manifest: {e}")))?;
    tokio::fs::write(&tmp, payload)
        .await
        .map_err(|e| OpError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(|e| OpError::io(&path, e))?;
    Ok(())
}

/// Load the manifest for a job. A missing file maps to [`OpError::NotFound`]
/// so callers can distinguish "never existed / already cleaned up" from a
/// broken store.
pub async fn load_manifest(ws: &Workspace) -> Result<Manifest, OpError> {
    let path = ws.manifest_path();
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OpError::NotFound(ws.job_id.clone()))
        }
        Err(e) => return Err(OpError::io(&path, e)),
    };
    serde_json::from_slice(&data)
        .map_err(|e| OpError::internal(format!("failed to parse manifest for {}: {e}", ws.job_id)))
}

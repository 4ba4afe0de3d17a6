// crates/core/src/dispatch.rs
//! Sync-vs-async dispatch decision.
//!
//! Pure and IO-free so the policy stays trivially testable. The caller
//! combines this with scheduler availability: with no scheduler configured
//! the job always runs inline, which is how the core operates standalone.

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;

/// Thresholds above which a prepared job is routed to the background queue.
/// A zero threshold disables that check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncThresholds {
    pub bytes: u64,
    pub pages: u64,
}

/// True when the manifest's aggregate staged size exceeds the byte threshold
/// OR its aggregate page count exceeds the page threshold.
pub fn should_run_async(manifest: &Manifest, thresholds: &AsyncThresholds) -> bool {
    if thresholds.bytes > 0 && manifest.total_bytes() > thresholds.bytes {
        return true;
    }
    if thresholds.pages > 0 && manifest.total_pages() > thresholds.pages {
        return true;
    }
    false
}

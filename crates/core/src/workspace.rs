// crates/core/src/workspace.rs
//! Per-job scratch directories.
//!
//! Each job owns `<work_root>/<job_id>/` with an `in/` subtree for staged
//! inputs and an `out/` subtree for outputs. The pair is created together at
//! prepare time and removed together on cleanup; nothing outside the job ever
//! writes into it.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::OpError;
use crate::manifest::MANIFEST_FILENAME;
use crate::ops::META_FILENAME;

/// Exclusive scratch area for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub job_id: String,
    pub root: PathBuf,
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl Workspace {
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILENAME)
    }
}

/// Allocate a fresh job id and create its directory pair.
///
/// Fails only on underlying storage errors; those are fatal and not retried.
pub async fn create_workspace(work_root: &Path) -> Result<Workspace, OpError> {
    let job_id = Uuid::new_v4().to_string();
    let ws = layout(work_root, &job_id);
    tokio::fs::create_dir_all(&ws.in_dir)
        .await
        .map_err(|e| OpError::io(&ws.in_dir, e))?;
    tokio::fs::create_dir_all(&ws.out_dir)
        .await
        .map_err(|e| OpError::io(&ws.out_dir, e))?;
    Ok(ws)
}

/// Resolve the deterministic layout for an existing job id. Performs no IO.
pub fn workspace_for(work_root: &Path, job_id: &str) -> Result<Workspace, OpError> {
    if job_id.is_empty() || job_id.contains(['/', '\\', '.']) {
        return Err(OpError::invalid_input(format!(
            "invalid job id: {job_id:?}"
        )));
    }
    Ok(layout(work_root, job_id))
}

/// Remove a job's workspace recursively. Removing a workspace that does not
/// exist is not an error.
pub async fn remove_workspace(work_root: &Path, job_id: &str) -> Result<(), OpError> {
    let ws = workspace_for(work_root, job_id)?;
    match tokio::fs::remove_dir_all(&ws.root).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OpError::io(&ws.root, e)),
    }
}

fn layout(work_root: &Path, job_id: &str) -> Workspace {
    let root = work_root.join(job_id);
    Workspace {
        job_id: job_id.to_string(),
        in_dir: root.join("in"),
        out_dir: root.join("out"),
        root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_workspace_makes_both_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = create_workspace(tmp.path()).await.unwrap();
        assert!(ws.in_dir.is_dir());
        assert!(ws.out_dir.is_dir());
        assert!(ws.root.starts_with(tmp.path()));
        assert!(!ws.job_id.is_empty());
    }

    #[tokio::test]
    async fn test_fresh_ids_give_disjoint_workspaces() {
        let tmp = tempfile::tempdir().unwrap();
        let a = create_workspace(tmp.path()).await.unwrap();
        let b = create_workspace(tmp.path()).await.unwrap();
        assert_ne!(a.job_id, b.job_id);
        assert_ne!(a.root, b.root);
    }

    #[tokio::test]
    async fn test_remove_workspace_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = create_workspace(tmp.path()).await.unwrap();
        remove_workspace(tmp.path(), &ws.job_id).await.unwrap();
        assert!(!ws.root.exists());
        // Second removal of the same id is a no-op.
        remove_workspace(tmp.path(), &ws.job_id).await.unwrap();
        // And so is removing an id that never existed.
        remove_workspace(tmp.path(), "no-such-job").await.unwrap();
    }

    #[test]
    fn test_workspace_for_rejects_path_escapes() {
        let root = Path::new("/srv/work");
        assert!(workspace_for(root, "").is_err());
        assert!(workspace_for(root, "../etc").is_err());
        assert!(workspace_for(root, "a/b").is_err());
        assert!(workspace_for(root, "8f2e0c1d").is_ok());
    }
}

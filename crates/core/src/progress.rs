// crates/core/src/progress.rs
//! Progress reporting callback for the executors.
//!
//! Executors report at fixed checkpoints; the worker wires the callback into
//! the job record store. Percent values are clamped to 0-100 here so every
//! caller sees the same bounds.

/// Stage names reported by the executors and mirrored into job records.
pub mod stage {
    pub const QUEUED: &str = "queued";
    pub const LOAD: &str = "load";
    pub const PROCESS: &str = "process";
    pub const WRITE: &str = "write";
    pub const COMPLETED: &str = "completed";
}

/// Callback invoked at progress checkpoints with `(stage, percent)`. The
/// lifetime lets callers hand in closures borrowing local state.
pub type ProgressFn<'a> = dyn Fn(&str, u8) + Send + Sync + 'a;

/// Report a checkpoint if a reporter is attached, clamping percent to 100.
pub fn report(progress: Option<&ProgressFn<'_>>, stage: &str, percent: u8) {
    if let Some(cb) = progress {
        cb(stage, percent.min(100));
    }
}

// crates/core/src/testing.rs
//! Test doubles shared by the unit and integration tests.
//!
//! Fake documents are plain text behind a `%PDF-` magic header: line two
//! declares `pages N`, then one `page …` line per page. The fakes let every
//! orchestration path run without a real PDF library while keeping page
//! identity observable, so tests can assert exact page ordering in outputs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::{Compressor, DocEngine};
use crate::error::OpError;
use crate::manifest::CompressPreset;

/// Write a fake document with pages named `page 1` through `page N`.
pub async fn write_fake_pdf(path: &Path, pages: u32) -> std::io::Result<()> {
    let lines: Vec<String> = (1..=pages).map(|p| format!("page {p}")).collect();
    write_fake_pdf_with(path, &lines).await
}

/// Write a fake document with caller-chosen page lines, for tests that need
/// to tell pages of different sources apart.
pub async fn write_fake_pdf_with(path: &Path, page_lines: &[String]) -> std::io::Result<()> {
    let mut body = format!("%PDF-1.7 fake\npages {}\n", page_lines.len());
    for line in page_lines {
        body.push_str(line);
        body.push('\n');
    }
    tokio::fs::write(path, body).await
}

/// Parse a fake document into its page count and page lines.
pub async fn read_fake_pdf(path: &Path) -> Result<(u32, Vec<String>), OpError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| OpError::io(path, e))?;
    let mut lines = text.lines();
    if !lines.next().unwrap_or_default().starts_with("%PDF-") {
        return Err(OpError::unsupported(format!(
            "{} is not a document",
            path.display()
        )));
    }
    let count: u32 = lines
        .next()
        .unwrap_or_default()
        .strip_prefix("pages ")
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| {
            OpError::unsupported(format!("{} has no page table", path.display()))
        })?;
    Ok((count, lines.map(str::to_string).collect()))
}

/// [`DocEngine`] over fake documents.
pub struct FakeEngine;

#[async_trait]
impl DocEngine for FakeEngine {
    async fn page_count(&self, source: &Path) -> Result<u32, OpError> {
        Ok(read_fake_pdf(source).await?.0)
    }

    async fn collect_pages(
        &self,
        source: &Path,
        output: &Path,
        pages: &[u32],
    ) -> Result<(), OpError> {
        let (count, lines) = read_fake_pdf(source).await?;
        let mut selected = Vec::with_capacity(pages.len());
        for &page in pages {
            if page < 1 || page > count {
                return Err(OpError::internal(format!(
                    "page {page} outside 1-{count} in {}",
                    source.display()
                )));
            }
            selected.push(lines[(page - 1) as usize].clone());
        }
        write_fake_pdf_with(output, &selected)
            .await
            .map_err(|e| OpError::io(output, e))
    }

    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<(), OpError> {
        let mut all = Vec::new();
        for input in inputs {
            let (_, lines) = read_fake_pdf(input).await?;
            all.extend(lines);
        }
        write_fake_pdf_with(output, &all)
            .await
            .map_err(|e| OpError::io(output, e))
    }
}

/// [`Compressor`] that writes a fixed small body, so savings are positive for
/// any non-trivial source.
pub struct FakeCompressor;

#[async_trait]
impl Compressor for FakeCompressor {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        _preset: CompressPreset,
        cancel: &CancellationToken,
    ) -> Result<(), OpError> {
        if cancel.is_cancelled() {
            return Err(OpError::Cancelled);
        }
        let (count, _) = read_fake_pdf(input).await?;
        tokio::fs::write(output, format!("%PDF-1.7 fake\npages {count}\n"))
            .await
            .map_err(|e| OpError::io(output, e))
    }
}

/// Engine that sleeps before each transformation, for tests that need a job
/// to still be in flight when they act.
pub struct SlowEngine {
    pub delay: std::time::Duration,
}

#[async_trait]
impl DocEngine for SlowEngine {
    async fn page_count(&self, source: &Path) -> Result<u32, OpError> {
        FakeEngine.page_count(source).await
    }

    async fn collect_pages(
        &self,
        source: &Path,
        output: &Path,
        pages: &[u32],
    ) -> Result<(), OpError> {
        tokio::time::sleep(self.delay).await;
        FakeEngine.collect_pages(source, output, pages).await
    }

    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<(), OpError> {
        tokio::time::sleep(self.delay).await;
        FakeEngine.concatenate(inputs, output).await
    }
}

/// Engine whose staging works but whose transformations always fail with a
/// non-retryable error.
pub struct FailingEngine;

#[async_trait]
impl DocEngine for FailingEngine {
    async fn page_count(&self, source: &Path) -> Result<u32, OpError> {
        FakeEngine.page_count(source).await
    }

    async fn collect_pages(&self, _: &Path, _: &Path, _: &[u32]) -> Result<(), OpError> {
        Err(OpError::unsupported("document cannot be transformed"))
    }

    async fn concatenate(&self, _: &[PathBuf], _: &Path) -> Result<(), OpError> {
        Err(OpError::unsupported("document cannot be transformed"))
    }
}

/// Engine that fails the first `failures` transformations with a retryable
/// error, then behaves like [`FakeEngine`].
pub struct FlakyEngine {
    remaining: AtomicU32,
}

impl FlakyEngine {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining: AtomicU32::new(failures),
        }
    }

    fn trip(&self) -> Result<(), OpError> {
        let remaining = self.remaining.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(OpError::internal("transient transformation failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocEngine for FlakyEngine {
    async fn page_count(&self, source: &Path) -> Result<u32, OpError> {
        FakeEngine.page_count(source).await
    }

    async fn collect_pages(
        &self,
        source: &Path,
        output: &Path,
        pages: &[u32],
    ) -> Result<(), OpError> {
        self.trip()?;
        FakeEngine.collect_pages(source, output, pages).await
    }

    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<(), OpError> {
        self.trip()?;
        FakeEngine.concatenate(inputs, output).await
    }
}

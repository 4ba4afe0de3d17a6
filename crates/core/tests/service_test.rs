// crates/core/tests/service_test.rs
//! End-to-end coverage of the orchestration service: prepare, execute,
//! result access, and the cleanup guarantees.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use docsmith_core::testing::{
    read_fake_pdf, write_fake_pdf, write_fake_pdf_with, FailingEngine, FakeCompressor, FakeEngine,
};
use docsmith_core::{
    CompressPreset, CoreConfig, InputFile, OpError, OperationKind, ResultKind, ResultMeta, Service,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("docsmith_core=debug")
        .try_init();
}

fn test_service(tmp: &Path) -> Service {
    init_tracing();
    let cfg = CoreConfig {
        work_root: tmp.join("work"),
        job_ttl: Duration::from_secs(60),
        ..CoreConfig::default()
    };
    Service::new(cfg, Arc::new(FakeEngine), Arc::new(FakeCompressor))
}

async fn named_pdf(dir: &Path, name: &str, prefix: &str, pages: u32) -> InputFile {
    let path = dir.join(name);
    let lines: Vec<String> = (1..=pages).map(|p| format!("page {prefix}{p}")).collect();
    write_fake_pdf_with(&path, &lines).await.unwrap();
    InputFile::new(name, path)
}

fn job_dirs(work_root: &Path) -> usize {
    match std::fs::read_dir(work_root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn test_combine_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 5).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 5).await;

    let prepared = service
        .prepare_combine(&[a, b], None, &cancel)
        .await
        .unwrap();
    assert!(!prepared.run_async);

    let result = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap();
    assert_eq!(result.operation, OperationKind::Combine);
    assert_eq!(result.output_filename, "combined.pdf");
    assert_eq!(result.kind, ResultKind::Pdf);
    assert!(result.output_path.is_file());

    let (pages, lines) = read_fake_pdf(&result.output_path).await.unwrap();
    assert_eq!(pages, 10);
    assert_eq!(lines[0], "page a1");
    assert_eq!(lines[5], "page b1");

    match &result.meta {
        ResultMeta::Combine {
            total_pages,
            sources,
        } => {
            assert_eq!(*total_pages, 10);
            // Sources stay in upload order.
            assert_eq!(sources[0].name, "a.pdf");
            assert_eq!(sources[1].name, "b.pdf");
        }
        other => panic!("unexpected meta: {other:?}"),
    }

    // The same result is reachable through the access path.
    let opened = service.open_result(&prepared.job_id).await.unwrap();
    assert_eq!(opened.output_bytes, result.output_bytes);
    assert_eq!(opened.meta, result.meta);
}

#[tokio::test]
async fn test_combine_honors_explicit_order() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;

    let prepared = service
        .prepare_combine(&[a, b], Some(vec![1, 0]), &cancel)
        .await
        .unwrap();
    let result = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap();

    let (_, lines) = read_fake_pdf(&result.output_path).await.unwrap();
    assert_eq!(lines, vec!["page b1", "page b2", "page a1", "page a2"]);
}

#[tokio::test]
async fn test_reorder_permutes_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let input = named_pdf(tmp.path(), "doc.pdf", "", 3).await;
    let prepared = service
        .prepare_reorder(input, vec![2, 0, 1], &cancel)
        .await
        .unwrap();
    let result = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap();

    assert_eq!(result.output_filename, "reordered.pdf");
    let (_, lines) = read_fake_pdf(&result.output_path).await.unwrap();
    assert_eq!(lines, vec!["page 3", "page 1", "page 2"]);
    match &result.meta {
        ResultMeta::Reorder { order, source } => {
            assert_eq!(order, &vec![2, 0, 1]);
            assert_eq!(source.page_count, 3);
        }
        other => panic!("unexpected meta: {other:?}"),
    }
}

#[tokio::test]
async fn test_extract_packs_parts_into_zip() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let input = named_pdf(tmp.path(), "doc.pdf", "", 12).await;
    let prepared = service
        .prepare_extract(input, "1-3,7,10-", &cancel)
        .await
        .unwrap();
    let result = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap();

    assert_eq!(result.output_filename, "extract.zip");
    assert_eq!(result.kind, ResultKind::Zip);

    match &result.meta {
        ResultMeta::Extract { parts, ranges, .. } => {
            assert_eq!(ranges.len(), 3);
            let counts: Vec<u32> = parts.iter().map(|p| p.page_count).collect();
            assert_eq!(counts, vec![3, 1, 3]);
            assert_eq!(parts[0].filename, "part-01.pdf");
            assert_eq!(parts[2].from_page, 10);
            assert_eq!(parts[2].to_page, 12);
        }
        other => panic!("unexpected meta: {other:?}"),
    }

    let file = std::fs::File::open(&result.output_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 3);
    use std::io::Read;
    let mut body = String::new();
    archive
        .by_name("part-02.pdf")
        .unwrap()
        .read_to_string(&mut body)
        .unwrap();
    assert!(body.contains("page 7"));
}

#[tokio::test]
async fn test_compress_reports_savings() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let input = named_pdf(tmp.path(), "doc.pdf", "", 8).await;
    let prepared = service
        .prepare_compress(input, CompressPreset::Aggressive, &cancel)
        .await
        .unwrap();
    let result = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap();

    assert_eq!(result.output_filename, "compressed.pdf");
    match &result.meta {
        ResultMeta::Compress {
            original_bytes,
            output_bytes,
            saved_bytes,
            saved_percent,
            preset,
            ..
        } => {
            assert!(output_bytes < original_bytes);
            assert!(*saved_bytes > 0);
            assert!(*saved_percent > 0.0);
            assert_eq!(*preset, CompressPreset::Aggressive);
        }
        other => panic!("unexpected meta: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_combine_order_rejected_before_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;

    let err = service
        .prepare_combine(&[a, b], Some(vec![0, 0]), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
    // Nothing was staged, so the work root holds no job directory.
    assert_eq!(job_dirs(&service.config().work_root), 0);
}

#[tokio::test]
async fn test_rejected_prepare_leaves_no_workspace() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    // Page order length mismatch, caught after staging.
    let input = named_pdf(tmp.path(), "doc.pdf", "", 3).await;
    let err = service
        .prepare_reorder(input, vec![0, 1], &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
    assert_eq!(job_dirs(&service.config().work_root), 0);

    // Malformed range expression, also caught after staging.
    let input = named_pdf(tmp.path(), "doc.pdf", "", 3).await;
    let err = service
        .prepare_extract(input, "3-1", &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
    assert_eq!(job_dirs(&service.config().work_root), 0);
}

#[tokio::test]
async fn test_single_input_combine_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let input = named_pdf(tmp.path(), "only.pdf", "", 2).await;
    let err = service
        .prepare_combine(std::slice::from_ref(&input), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_failed_run_removes_workspace_immediately() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = CoreConfig {
        work_root: tmp.path().join("work"),
        ..CoreConfig::default()
    };
    let service = Service::new(cfg, Arc::new(FailingEngine), Arc::new(FakeCompressor));
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;
    let prepared = service
        .prepare_combine(&[a, b], None, &cancel)
        .await
        .unwrap();

    let err = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_FORMAT");

    assert_eq!(job_dirs(&service.config().work_root), 0);
    let err = service.open_result(&prepared.job_id).await.unwrap_err();
    assert!(matches!(err, OpError::NotFound(_)));
}

#[tokio::test]
async fn test_result_expires_after_ttl() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = CoreConfig {
        work_root: tmp.path().join("work"),
        job_ttl: Duration::from_millis(50),
        ..CoreConfig::default()
    };
    let service = Service::new(cfg, Arc::new(FakeEngine), Arc::new(FakeCompressor));
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;
    let prepared = service
        .prepare_combine(&[a, b], None, &cancel)
        .await
        .unwrap();
    let result = service
        .run_job(&prepared.job_id, None, &cancel)
        .await
        .unwrap();
    assert!(result.output_path.is_file());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(job_dirs(&service.config().work_root), 0);
    let err = service.open_result(&prepared.job_id).await.unwrap_err();
    assert!(matches!(err, OpError::NotFound(_)));
}

#[tokio::test]
async fn test_result_unavailable_before_execution() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;
    let prepared = service
        .prepare_combine(&[a, b], None, &cancel)
        .await
        .unwrap();

    let err = service.open_result(&prepared.job_id).await.unwrap_err();
    assert!(matches!(err, OpError::NotFound(_)));
}

#[tokio::test]
async fn test_prepared_jobs_are_independent() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;
    let first = service
        .prepare_combine(&[a.clone(), b.clone()], None, &cancel)
        .await
        .unwrap();
    let second = service.prepare_combine(&[a, b], None, &cancel).await.unwrap();

    assert_ne!(first.job_id, second.job_id);
    assert!(service.inspect(&first.job_id).await.is_ok());
    assert!(service.inspect(&second.job_id).await.is_ok());

    // Discarding one leaves the other intact.
    service.discard_job(&first.job_id).await.unwrap();
    assert!(service.inspect(&first.job_id).await.is_err());
    assert!(service.inspect(&second.job_id).await.is_ok());
}

#[tokio::test]
async fn test_thresholds_route_large_jobs_async() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = CoreConfig {
        work_root: tmp.path().join("work"),
        thresholds: docsmith_core::AsyncThresholds { bytes: 0, pages: 3 },
        ..CoreConfig::default()
    };
    let service = Service::new(cfg, Arc::new(FakeEngine), Arc::new(FakeCompressor));
    let cancel = CancellationToken::new();

    let a = named_pdf(tmp.path(), "a.pdf", "a", 2).await;
    let b = named_pdf(tmp.path(), "b.pdf", "b", 2).await;
    let prepared = service
        .prepare_combine(&[a, b], None, &cancel)
        .await
        .unwrap();
    assert!(prepared.run_async);
}

#[tokio::test]
async fn test_progress_checkpoints_are_monotonic() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let cancel = CancellationToken::new();

    let input = named_pdf(tmp.path(), "doc.pdf", "", 12).await;
    let prepared = service
        .prepare_extract(input, "1-3,7,10-", &cancel)
        .await
        .unwrap();

    let seen = std::sync::Mutex::new(Vec::<(String, u8)>::new());
    let progress = |stage: &str, percent: u8| {
        seen.lock().unwrap().push((stage.to_string(), percent));
    };
    service
        .run_job(
            &prepared.job_id,
            Some(&progress as &docsmith_core::ProgressFn<'_>),
            &cancel,
        )
        .await
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "progress went backwards: {seen:?}");
    }
    assert_eq!(seen.last().unwrap(), &("completed".to_string(), 100));
}

#[tokio::test]
async fn test_inspect_input_reports_shape_and_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());

    let input = named_pdf(tmp.path(), "report.pdf", "", 7).await;
    let size = tokio::fs::metadata(&input.path).await.unwrap().len();
    let meta = service
        .inspect_input(input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(meta.name, "report.pdf");
    assert_eq!(meta.page_count, 7);
    assert_eq!(meta.size_bytes, size);
    // Inspection never leaves a job behind.
    assert_eq!(job_dirs(&service.config().work_root), 0);
}

#[tokio::test]
async fn test_run_unknown_job_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let service = test_service(tmp.path());
    let err = service
        .run_job("no-such-job", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OpError::NotFound(_)));
}

#[tokio::test]
async fn test_fake_pdf_fixture_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("doc.pdf");
    write_fake_pdf(&path, 4).await.unwrap();
    let (pages, lines) = read_fake_pdf(&path).await.unwrap();
    assert_eq!(pages, 4);
    assert_eq!(lines.len(), 4);
}

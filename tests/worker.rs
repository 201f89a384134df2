//! Jobs on the blocking pool: progress stream, cancellation, result folding.

mod common;

use common::*;
use docshift::worker;
use docshift::{
    BatchOptions, BatchState, Conversion, ConversionRequest, Outcome, PdfToDocxMode,
    RasterOptions,
};
use tempfile::TempDir;
use tokio_stream::StreamExt;

#[tokio::test]
async fn request_job_streams_progress_and_settles() {
    let dir = TempDir::new().unwrap();
    let src = fake_pdf(dir.path(), "doc.pdf", 3);
    let request = ConversionRequest::beside_source(
        &src,
        Conversion::PdfToDocx(PdfToDocxMode::Raster(RasterOptions::default().dpi(72))),
    );

    let mut job = worker::spawn(engines(), request);
    let events: Vec<_> = job.take_progress().unwrap().collect().await;
    let result = job.wait().await.unwrap();

    assert_eq!(result.outcome, Outcome::Succeeded);
    assert_eq!(events.first().map(|e| (e.current, e.total)), Some((0, 3)));
    assert_eq!(events.last().map(|e| (e.current, e.total)), Some((3, 3)));
    assert!(dir.path().join("doc.docx").exists());
}

#[tokio::test]
async fn fatal_errors_become_failed_results() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::beside_source(
        dir.path().join("missing.pdf"),
        Conversion::PdfToDocx(PdfToDocxMode::default()),
    );

    let result = worker::spawn(engines(), request).wait().await.unwrap();

    assert_eq!(result.outcome, Outcome::Failed);
    assert!(result.message.unwrap().contains("missing.pdf"));
}

#[tokio::test]
async fn cancelled_before_start_yields_cancelled_result() {
    let dir = TempDir::new().unwrap();
    let src = fake_pdf(dir.path(), "doc.pdf", 50);
    let dst = dir.path().join("doc.docx");
    let request = ConversionRequest::new(
        &src,
        &dst,
        Conversion::PdfToDocx(PdfToDocxMode::Raster(RasterOptions::default().dpi(300))),
    );

    let token = docshift::CancellationToken::new();
    token.cancel();
    let engines = engines();
    let job = worker::spawn_job(move |control| {
        let control = control.clone().with_token(token);
        docshift::OperationResult::settle(docshift::convert::run(&engines, &request, &control))
    });
    let result = job.wait().await.unwrap();

    assert_eq!(result.outcome, Outcome::Cancelled);
    assert!(!dst.exists());
}

#[tokio::test]
async fn batch_job_reports_per_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let files = vec![
        fake_pdf(dir.path(), "a.pdf", 1),
        corrupt_file(dir.path(), "b.pdf"),
    ];

    let mut job = worker::spawn_batch(engines(), files, out.clone(), BatchOptions::default());
    let events: Vec<_> = job.take_progress().unwrap().collect().await;
    let report = job.wait().await.unwrap();

    assert_eq!(report.state, BatchState::Completed);
    assert_eq!((report.done, report.total), (2, 2));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        events.iter().map(|e| e.current).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

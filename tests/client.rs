//! The upload client against a live server on a loopback port.
//!
//! Run with:
//!   cargo test --test client

mod common;

use axum::routing::post;
use axum::Router;
use common::*;
use edgequake_sheet2pdf::client::{upload_workbook, write_sheet_pdfs};
use edgequake_sheet2pdf::server::{router, CONVERT_PATH};
use edgequake_sheet2pdf::Sheet2PdfError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serve `app` on an ephemeral port and return its base URL.
async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn write_workbook(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[tokio::test]
async fn converted_sheets_come_back_in_order() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeExcel::with_sheets(&["A", "B", "C"]));
    let server = spawn_server(router(converter(&fake, scratch.path()))).await;
    let workbook = write_workbook(inputs.path(), "Q1.xlsx", XLSX_BYTES);

    let sheets = upload_workbook(&server, &workbook, 10).await.unwrap();

    let names: Vec<_> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(fake.launches(), 1);
    assert_eq!(fake.quits(), 1);

    let out = tempfile::tempdir().unwrap();
    let written = write_sheet_pdfs(&sheets, out.path(), "Q1").await.unwrap();
    assert_eq!(written.len(), 3);
    assert!(written[2].ends_with("Q1-03-C.pdf"));
    let pdf = std::fs::read(&written[0]).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn full_endpoint_url_is_accepted() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeExcel::with_sheets(&["Only"]));
    let server = spawn_server(router(converter(&fake, scratch.path()))).await;
    let workbook = write_workbook(inputs.path(), "book.xlsx", XLSX_BYTES);

    let sheets = upload_workbook(&format!("{server}{CONVERT_PATH}"), &workbook, 10)
        .await
        .unwrap();

    assert_eq!(sheets.len(), 1);
}

#[tokio::test]
async fn server_failure_is_reported_with_its_status() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeExcel::with_sheets(&["Sheet1"]));
    let server = spawn_server(router(converter(&fake, scratch.path()))).await;
    let workbook = write_workbook(inputs.path(), "broken.xlsx", b"definitely not a workbook");

    let err = upload_workbook(&server, &workbook, 10).await.unwrap_err();

    match err {
        Sheet2PdfError::RemoteRejected { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("file format"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_windows_server_is_reported_as_rejection() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeExcel::with_sheets(&["Sheet1"]).unsupported_platform());
    let server = spawn_server(router(converter(&fake, scratch.path()))).await;
    let workbook = write_workbook(inputs.path(), "Q1.xlsx", XLSX_BYTES);

    let err = upload_workbook(&server, &workbook, 10).await.unwrap_err();

    match err {
        Sheet2PdfError::RemoteRejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "This endpoint only works on Windows servers");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_reply_is_an_upload_failure() {
    let inputs = tempfile::tempdir().unwrap();
    let app = Router::new().route(CONVERT_PATH, post(|| async { "<html>proxy error</html>" }));
    let server = spawn_server(app).await;
    let workbook = write_workbook(inputs.path(), "Q1.xlsx", XLSX_BYTES);

    let err = upload_workbook(&server, &workbook, 10).await.unwrap_err();

    match err {
        Sheet2PdfError::UploadFailed { url, reason } => {
            assert!(url.ends_with(CONVERT_PATH), "{url}");
            assert!(reason.contains("not a conversion result"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_an_upload_failure() {
    let inputs = tempfile::tempdir().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let workbook = write_workbook(inputs.path(), "Q1.xlsx", XLSX_BYTES);

    let err = upload_workbook(&format!("http://{addr}"), &workbook, 5)
        .await
        .unwrap_err();

    assert!(matches!(err, Sheet2PdfError::UploadFailed { .. }), "{err:?}");
}

//! Shared fixtures: a scripted stand-in for Excel and multipart helpers.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use edgequake_sheet2pdf::config::{ExportOptions, PageSetup};
use edgequake_sheet2pdf::{
    AutomationHost, ConversionConfig, ConvertResponse, Converter, HostSession, Sheet2PdfError,
};
use http_body_util::BodyExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const BOUNDARY: &str = "sheet2pdf-test-boundary";

/// Zip local-file-header magic; enough for the fake to accept the file.
pub const XLSX_BYTES: &[u8] = b"PK\x03\x04 fake workbook body";

/// In-process replacement for Excel.
///
/// Accepts files that start with the zip or OLE2 magic, exports every sheet
/// as a tiny valid-looking PDF, and counts launches and quits.
#[derive(Default)]
pub struct FakeExcel {
    pub unsupported: bool,
    pub unavailable: bool,
    pub sheets: Vec<String>,
    pub fail_export_on: Option<usize>,
    pub export_delay: Option<Duration>,

    pub availability_checks: AtomicUsize,
    pub launches: AtomicUsize,
    pub quits: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub opened: Mutex<Vec<PathBuf>>,
}

impl FakeExcel {
    pub fn with_sheets(names: &[&str]) -> Self {
        Self {
            sheets: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn unsupported_platform(mut self) -> Self {
        self.unsupported = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn failing_export(mut self, index: usize) -> Self {
        self.fail_export_on = Some(index);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.export_delay = Some(delay);
        self
    }

    pub fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

struct FakeSession {
    host: Arc<FakeExcel>,
    workbook_open: bool,
}

/// Host handle given to the converter; shares state with the test.
pub struct SharedFake(pub Arc<FakeExcel>);

impl AutomationHost for SharedFake {
    fn name(&self) -> &str {
        "fake-excel"
    }

    fn platform_supported(&self) -> bool {
        !self.0.unsupported
    }

    fn check_available(&self) -> Result<(), Sheet2PdfError> {
        self.0.availability_checks.fetch_add(1, Ordering::SeqCst);
        if self.0.unavailable {
            Err(Sheet2PdfError::AutomationUnavailable {
                detail: "Excel.Application is not registered".into(),
            })
        } else {
            Ok(())
        }
    }

    fn launch(&self) -> Result<Box<dyn HostSession>, Sheet2PdfError> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            host: Arc::clone(&self.0),
            workbook_open: false,
        }))
    }
}

impl HostSession for FakeSession {
    fn open_workbook(&mut self, path: &Path) -> Result<(), Sheet2PdfError> {
        self.host.opened.lock().unwrap().push(path.to_path_buf());
        let bytes = std::fs::read(path).map_err(|e| automation(e.to_string()))?;
        let is_zip = bytes.starts_with(b"PK\x03\x04");
        let is_ole = bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]);
        if !is_zip && !is_ole {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            return Err(automation(format!(
                "Excel cannot open the file '{name}' because the file format or file extension is not valid."
            )));
        }
        self.workbook_open = true;
        Ok(())
    }

    fn worksheet_count(&mut self) -> Result<usize, Sheet2PdfError> {
        Ok(self.host.sheets.len())
    }

    fn worksheet_name(&mut self, index: usize) -> Result<String, Sheet2PdfError> {
        self.host
            .sheets
            .get(index - 1)
            .cloned()
            .ok_or_else(|| automation("Subscript out of range"))
    }

    fn apply_page_setup(&mut self, _index: usize, _setup: &PageSetup) -> Result<(), Sheet2PdfError> {
        Ok(())
    }

    fn export_pdf(
        &mut self,
        index: usize,
        output: &Path,
        _options: &ExportOptions,
    ) -> Result<(), Sheet2PdfError> {
        if let Some(delay) = self.host.export_delay {
            std::thread::sleep(delay);
        }
        if self.host.fail_export_on == Some(index) {
            return Err(automation("Document not saved."));
        }
        let body = format!("%PDF-1.7\n% sheet {}\n%%EOF\n", self.host.sheets[index - 1]);
        std::fs::write(output, body).map_err(|e| automation(e.to_string()))
    }

    fn close_workbook(&mut self, _save_changes: bool) -> Result<(), Sheet2PdfError> {
        self.workbook_open = false;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), Sheet2PdfError> {
        self.host.quits.fetch_add(1, Ordering::SeqCst);
        self.host.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn automation(message: impl Into<String>) -> Sheet2PdfError {
    Sheet2PdfError::Automation {
        message: message.into(),
    }
}

/// Route crate logs to the test harness. `RUST_LOG` overrides the default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A converter around `fake` whose scratch files land in `scratch_root`.
pub fn converter(fake: &Arc<FakeExcel>, scratch_root: &Path) -> Converter {
    init_tracing();
    let config = ConversionConfig::builder()
        .scratch_root(scratch_root)
        .build()
        .unwrap();
    Converter::new(Arc::new(SharedFake(Arc::clone(fake))), config)
}

/// `multipart/form-data` request carrying one file field.
pub fn upload_request(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    multipart_request(body)
}

/// `multipart/form-data` request with a single text field and no file.
pub fn text_only_request() -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );
    multipart_request(body.into_bytes())
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/convert-excel")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn read_json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn read_convert_response(response: Response<Body>) -> ConvertResponse {
    read_json(response).await
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

//! Client side of the conversion endpoint.
//!
//! Excel only runs on Windows, but the workbooks usually live elsewhere.
//! This module uploads a workbook to a `sheet2pdf serve` instance exactly as
//! the web front-end does (multipart, field `excelFile`) and turns the
//! returned data URIs back into PDF files.

use crate::error::Sheet2PdfError;
use crate::output::{ConvertResponse, SheetExport};
use crate::pipeline::encode::{self, PDF_MIME, PNG_MIME};
use crate::server::routes::UPLOAD_FIELD;
use crate::server::CONVERT_PATH;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xls", "xlsx", "xlsm"];

/// Whether `path` has a workbook extension the endpoint is meant for.
pub fn is_spreadsheet_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// MIME type browsers send for each workbook extension.
fn spreadsheet_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsm") => "application/vnd.ms-excel.sheet.macroEnabled.12",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Accept either a server root (`http://host:5000`) or the full endpoint URL.
pub fn endpoint_url(server: &str) -> String {
    let trimmed = server.trim_end_matches('/');
    if trimmed.ends_with(CONVERT_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{CONVERT_PATH}")
    }
}

/// Upload a workbook and return its sheets in workbook order.
///
/// # Errors
/// * [`Sheet2PdfError::NotASpreadsheet`] — wrong extension, nothing sent
/// * [`Sheet2PdfError::UploadFailed`] — connection/timeout or a non-JSON reply
/// * [`Sheet2PdfError::RemoteRejected`] — the server answered `success: false`
pub async fn upload_workbook(
    server: &str,
    path: &Path,
    timeout_secs: u64,
) -> Result<Vec<SheetExport>, Sheet2PdfError> {
    if !is_spreadsheet_path(path) {
        return Err(Sheet2PdfError::NotASpreadsheet {
            path: path.to_path_buf(),
        });
    }

    let url = endpoint_url(server);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Sheet2PdfError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string());

    info!("Uploading '{}' ({} bytes) to {}", file_name, bytes.len(), url);

    let failed = |reason: String| Sheet2PdfError::UploadFailed {
        url: url.clone(),
        reason,
    };

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(spreadsheet_mime(path))
        .map_err(|e| failed(e.to_string()))?;
    let form = Form::new().part(UPLOAD_FIELD, part);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                failed(format!("timed out after {timeout_secs}s"))
            } else {
                failed(e.to_string())
            }
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| failed(e.to_string()))?;
    debug!("Server answered HTTP {} ({} bytes)", status, body.len());

    let reply: ConvertResponse = serde_json::from_str(&body)
        .map_err(|_| failed(format!("HTTP {status}: response is not a conversion result")))?;

    if !reply.success {
        return Err(Sheet2PdfError::RemoteRejected {
            status: status.as_u16(),
            message: reply
                .error
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    Ok(reply.pdfs.unwrap_or_default())
}

/// Make a sheet name safe to use in a filename.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "sheet".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Decode every sheet's PDF into `dir` as `<stem>-<NN>-<sheet>.pdf`.
///
/// Raster thumbnails, when present, are written alongside as
/// `<stem>-<NN>-<sheet>.thumb.png`. Each file is written atomically
/// (temp + rename). Returns the PDF paths in sheet order.
pub async fn write_sheet_pdfs(
    sheets: &[SheetExport],
    dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, Sheet2PdfError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Sheet2PdfError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(sheets.len());
    for (i, sheet) in sheets.iter().enumerate() {
        let base = format!("{}-{:02}-{}", stem, i + 1, sanitize_sheet_name(&sheet.name));

        let (mime, pdf) = encode::decode_data_uri(&sheet.pdf)?;
        if mime != PDF_MIME || !encode::has_pdf_signature(&pdf) {
            return Err(Sheet2PdfError::InvalidDataUri {
                reason: format!("sheet '{}' is not a PDF ({mime})", sheet.name),
            });
        }
        let path = dir.join(format!("{base}.pdf"));
        write_atomic(&path, &pdf).await?;

        if sheet.thumbnail != sheet.pdf {
            let (mime, png) = encode::decode_data_uri(&sheet.thumbnail)?;
            if mime == PNG_MIME {
                write_atomic(&dir.join(format!("{base}.thumb.png")), &png).await?;
            }
        }

        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Sheet2PdfError> {
    let tmp_path = path.with_extension("tmp");
    let failed = |e: std::io::Error| Sheet2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}

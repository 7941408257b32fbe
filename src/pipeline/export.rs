//! Export: drive the automation host through one workbook.
//!
//! The whole host conversation happens on one blocking thread because the
//! host is a synchronous external process and COM apartments are
//! thread-affine. The sequence per workbook is
//!
//! ```text
//! launch → open → count → for i in 1..=N { name, page setup, export, read, delete } → close → quit
//! ```
//!
//! The first failure aborts the workbook; the host is closed and quit on
//! the way out regardless.

use crate::config::ConversionConfig;
use crate::error::{CleanupError, Sheet2PdfError};
use crate::host::{AutomationHost, HostGuard, HostPermit, HostSession};
use crate::pipeline::encode;
use crate::pipeline::stage::StagedUpload;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One worksheet as exported by the host: raw PDF bytes, not yet encoded.
#[derive(Debug, Clone)]
pub struct ExportedSheet {
    /// 1-based position in the workbook.
    pub index: usize,
    pub name: String,
    pub pdf: Vec<u8>,
}

/// Everything one host session produced.
#[derive(Debug)]
pub struct HostRun {
    pub sheets: Vec<ExportedSheet>,
    /// Launch to quit.
    pub host_duration: Duration,
}

/// Run [`export_workbook_blocking`] on the blocking pool.
///
/// Takes ownership of everything the job needs. The arbiter permit is
/// released and the staged upload deleted inside the job, as soon as the
/// host has quit, whatever the outcome.
pub async fn export_workbook(
    host: Arc<dyn AutomationHost>,
    staged: StagedUpload,
    config: ConversionConfig,
    permit: HostPermit,
) -> Result<HostRun, Sheet2PdfError> {
    tokio::task::spawn_blocking(move || {
        let result = export_workbook_blocking(host.as_ref(), &staged, &config);
        drop(permit);
        staged.cleanup();
        result
    })
    .await
    .map_err(|e| Sheet2PdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Export every worksheet of `staged` to PDF.
///
/// Blocking; call from `spawn_blocking`. The host session is quit before
/// this returns, on success and on failure.
pub fn export_workbook_blocking(
    host: &dyn AutomationHost,
    staged: &StagedUpload,
    config: &ConversionConfig,
) -> Result<HostRun, Sheet2PdfError> {
    let started = Instant::now();
    let mut guard = HostGuard::launch(host)?;

    let result = match export_sheets(&mut *guard, staged, config) {
        Ok(sheets) => guard.close_workbook(false).map(|()| sheets),
        Err(e) => {
            if let Err(close_err) = guard.close_workbook(false) {
                let issue = CleanupError::CloseWorkbook {
                    detail: close_err.to_string(),
                };
                warn!("{}", issue);
            }
            Err(e)
        }
    };

    guard.release();
    let host_duration = started.elapsed();
    debug!("{} session lasted {}ms", host.name(), host_duration.as_millis());

    result.map(|sheets| HostRun {
        sheets,
        host_duration,
    })
}

fn export_sheets(
    session: &mut dyn HostSession,
    staged: &StagedUpload,
    config: &ConversionConfig,
) -> Result<Vec<ExportedSheet>, Sheet2PdfError> {
    session.open_workbook(staged.path())?;

    let total = session.worksheet_count()?;
    info!("Workbook '{}' has {} sheets", staged.original_name(), total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }

    let mut sheets = Vec::with_capacity(total);
    for index in 1..=total {
        match export_sheet(session, index, total, staged.scratch_dir(), config) {
            Ok(sheet) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_sheet_complete(index, total, &sheet.name, sheet.pdf.len());
                }
                sheets.push(sheet);
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_sheet_error(index, total, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total);
    }
    Ok(sheets)
}

fn export_sheet(
    session: &mut dyn HostSession,
    index: usize,
    total: usize,
    scratch: &Path,
    config: &ConversionConfig,
) -> Result<ExportedSheet, Sheet2PdfError> {
    let name = session.worksheet_name(index)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_sheet_start(index, total, &name);
    }

    session.apply_page_setup(index, &config.page_setup)?;

    let pdf_path = scratch.join(format!("{}.pdf", Uuid::new_v4()));
    let exported = session
        .export_pdf(index, &pdf_path, &config.export)
        .and_then(|()| read_exported_pdf(&pdf_path, &name));
    remove_exported_pdf(&pdf_path);
    let pdf = exported?;

    debug!("Exported sheet {}/{} '{}' → {} bytes", index, total, name, pdf.len());
    Ok(ExportedSheet { index, name, pdf })
}

fn read_exported_pdf(path: &Path, sheet: &str) -> Result<Vec<u8>, Sheet2PdfError> {
    let bytes = std::fs::read(path).map_err(|e| Sheet2PdfError::ExportReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !encode::has_pdf_signature(&bytes) {
        return Err(Sheet2PdfError::NotAPdf {
            sheet: sheet.to_string(),
            magic: bytes.iter().take(8).copied().collect(),
        });
    }
    Ok(bytes)
}

fn remove_exported_pdf(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            let issue = CleanupError::RemoveExport {
                path: path.to_path_buf(),
                source: e,
            };
            warn!("{}", issue);
        }
    }
}

//! Conversion entry points.
//!
//! [`Converter`] owns the long-lived pieces (host, arbiter, config) and is
//! what the HTTP server shares across requests. The free functions
//! [`convert_file`], [`convert_bytes`] and [`convert_file_sync`] build a
//! one-off converter around [`ExcelHost`] for library and CLI use.

use crate::config::{ConversionConfig, ThumbnailMode};
use crate::error::Sheet2PdfError;
use crate::host::{AutomationHost, ExcelHost, HostArbiter};
use crate::output::{ConversionOutput, ConversionStats, SheetExport};
use crate::pipeline::export::{self, ExportedSheet};
use crate::pipeline::stage::{self, Upload};
use crate::pipeline::{encode, thumbnail};
use crate::preflight::run_preflight;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Converts uploads using one automation host and one arbiter.
#[derive(Clone)]
pub struct Converter {
    host: Arc<dyn AutomationHost>,
    arbiter: HostArbiter,
    config: ConversionConfig,
}

impl Converter {
    pub fn new(host: Arc<dyn AutomationHost>, config: ConversionConfig) -> Self {
        let arbiter = HostArbiter::new(config.max_concurrent_hosts);
        Self {
            host,
            arbiter,
            config,
        }
    }

    pub fn host(&self) -> &dyn AutomationHost {
        self.host.as_ref()
    }

    /// Run the preflight chain on the outcome of reading a request.
    pub fn preflight(
        &self,
        upload: Result<Option<Upload>, Sheet2PdfError>,
    ) -> Result<Upload, Sheet2PdfError> {
        run_preflight(self.host.as_ref(), upload)
    }

    /// Convert one workbook to one PDF per worksheet.
    ///
    /// # Errors
    /// Any precondition failure, or the first failure inside the host. There
    /// is no partial result. Scratch files and the host process are released
    /// before this returns either way.
    pub async fn convert_upload(&self, upload: Upload) -> Result<ConversionOutput, Sheet2PdfError> {
        let upload = self.preflight(Ok(Some(upload)))?;
        self.convert_checked(upload).await
    }

    /// [`Converter::convert_upload`] for an upload that already passed
    /// [`Converter::preflight`].
    pub async fn convert_checked(&self, upload: Upload) -> Result<ConversionOutput, Sheet2PdfError> {
        let total_start = Instant::now();
        info!(
            "Starting conversion: '{}' ({} bytes)",
            upload.file_name,
            upload.bytes.len()
        );

        // ── Step 1: Stage ────────────────────────────────────────────────
        let staged = stage::stage_upload(&upload, self.config.scratch_root.as_deref()).await?;
        drop(upload);

        // ── Step 2: Exclusive host access ────────────────────────────────
        let permit = self.arbiter.acquire().await;
        let queue_duration_ms = permit.waited().as_millis() as u64;

        // ── Step 3: Drive the host (blocking) ────────────────────────────
        let run = export::export_workbook(
            Arc::clone(&self.host),
            staged,
            self.config.clone(),
            permit,
        )
        .await?;

        let host_duration_ms = run.host_duration.as_millis() as u64;
        let total_pdf_bytes = run.sheets.iter().map(|s| s.pdf.len() as u64).sum::<u64>();

        // ── Step 4: Encode ───────────────────────────────────────────────
        let sheets = self.encode_sheets(run.sheets).await?;

        let stats = ConversionStats {
            sheet_count: sheets.len(),
            total_pdf_bytes,
            queue_duration_ms,
            host_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Conversion complete: {} sheets, {} PDF bytes, {}ms total ({}ms queued, {}ms in host)",
            stats.sheet_count,
            stats.total_pdf_bytes,
            stats.total_duration_ms,
            stats.queue_duration_ms,
            stats.host_duration_ms
        );

        Ok(ConversionOutput { sheets, stats })
    }

    async fn encode_sheets(
        &self,
        exported: Vec<ExportedSheet>,
    ) -> Result<Vec<SheetExport>, Sheet2PdfError> {
        match self.config.thumbnail {
            ThumbnailMode::Duplicate => Ok(exported
                .into_iter()
                .map(|s| {
                    debug!("Encoding sheet {} '{}'", s.index, s.name);
                    let pdf = encode::pdf_data_uri(&s.pdf);
                    SheetExport {
                        name: s.name,
                        thumbnail: pdf.clone(),
                        pdf,
                    }
                })
                .collect()),
            ThumbnailMode::Rasterize { max_pixels } => {
                let (exported, thumbs) =
                    thumbnail::rasterize_first_pages(exported, max_pixels).await?;
                Ok(exported
                    .into_iter()
                    .zip(thumbs)
                    .map(|(s, thumbnail)| {
                        debug!("Encoding sheet {} '{}' with raster thumbnail", s.index, s.name);
                        SheetExport {
                            name: s.name,
                            pdf: encode::pdf_data_uri(&s.pdf),
                            thumbnail,
                        }
                    })
                    .collect())
            }
        }
    }
}

/// Convert a workbook on disk with Excel.
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Sheet2PdfError> {
    let path = path.as_ref();
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
    convert_bytes(file_name, bytes, config).await
}

/// Convert workbook bytes held in memory with Excel.
///
/// `file_name` only needs a meaningful extension (`.xls`, `.xlsx`, …).
pub async fn convert_bytes(
    file_name: impl Into<String>,
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Sheet2PdfError> {
    let converter = Converter::new(Arc::new(ExcelHost::new()), config.clone());
    converter.convert_upload(Upload::new(file_name, bytes)).await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_file_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Sheet2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Sheet2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(path, config))
}

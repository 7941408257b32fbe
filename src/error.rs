//! Error types for the edgequake-sheet2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Sheet2PdfError`] — **Fatal**: the conversion cannot complete (wrong
//!   host platform, no upload, Excel refused the workbook). Returned as
//!   `Err(Sheet2PdfError)` from the `convert*` functions and turned into a
//!   `{"success": false, "error": …}` body by the HTTP layer.
//!
//! * [`CleanupError`] — **Non-fatal**: tearing down a request's resources
//!   failed (a scratch file could not be removed, the host refused to quit).
//!   These are logged at `warn` and never replace the primary result.
//!
//! There is no partial-success error: if sheet 3 of 10 fails the whole
//! conversion fails.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-sheet2pdf library.
#[derive(Debug, Error)]
pub enum Sheet2PdfError {
    // ── Environment errors ────────────────────────────────────────────────
    /// The host OS has no spreadsheet automation interface.
    #[error("This endpoint only works on Windows servers")]
    UnsupportedPlatform,

    /// The automation binding (PowerShell + Excel COM server) is missing.
    #[error("Excel automation is not available on the server: {detail}")]
    AutomationUnavailable { detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no `excelFile` field, or it was empty.
    #[error("No file provided")]
    NoFileProvided,

    /// The multipart body could not be read.
    #[error("Invalid upload: {reason}")]
    InvalidUpload { reason: String },

    /// A local input does not look like a workbook (checked by the CLI only).
    #[error("'{path}' is not a spreadsheet file\nSupported extensions: xls, xlsx, xlsm.")]
    NotASpreadsheet { path: PathBuf },

    /// A local input file could not be read.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Automation errors ─────────────────────────────────────────────────
    /// The automation host process could not be started.
    #[error("Failed to start the automation host: {detail}")]
    HostLaunchFailed { detail: String },

    /// Any failure raised inside the automation host while opening,
    /// configuring, exporting or closing. The message is the host's own.
    #[error("{message}")]
    Automation { message: String },

    /// The host reported success but the exported file is not a PDF.
    #[error("Export of sheet '{sheet}' did not produce a PDF\nFirst bytes: {magic:?}")]
    NotAPdf { sheet: String, magic: Vec<u8> },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the scratch directory or write the staged upload.
    #[error("Failed to stage upload in '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read an exported PDF back from disk.
    #[error("Failed to read exported PDF '{path}': {source}")]
    ExportReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Encoding / thumbnail errors ───────────────────────────────────────
    /// A `data:` URI was malformed or not base64.
    #[error("Invalid data URI: {reason}")]
    InvalidDataUri { reason: String },

    /// Rasterising the first page for a thumbnail failed.
    #[error("Thumbnail rendering failed for sheet '{sheet}': {detail}")]
    ThumbnailFailed { sheet: String, detail: String },

    // ── Client errors ─────────────────────────────────────────────────────
    /// The upload request never got a usable response.
    #[error("Failed to upload to '{url}': {reason}\nIs `sheet2pdf serve` running on the Windows host?")]
    UploadFailed { url: String, reason: String },

    /// The server answered with `success: false`.
    #[error("Server rejected the conversion (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Sheet2PdfError {
    /// HTTP status the endpoint answers with for this error.
    ///
    /// Only the precondition failures are client errors; everything that
    /// happens once conversion has started is a 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Sheet2PdfError::UnsupportedPlatform
            | Sheet2PdfError::NoFileProvided
            | Sheet2PdfError::InvalidUpload { .. }
            | Sheet2PdfError::NotASpreadsheet { .. } => 400,
            _ => 500,
        }
    }

    pub(crate) fn automation(message: impl Into<String>) -> Self {
        Sheet2PdfError::Automation {
            message: message.into(),
        }
    }
}

/// A non-fatal failure while releasing a request's resources.
///
/// Produced by the teardown path and reported through `tracing` only.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// A per-sheet PDF could not be deleted.
    #[error("could not remove exported PDF '{path}': {source}")]
    RemoveExport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The staged upload could not be deleted.
    #[error("could not remove staged upload '{path}': {source}")]
    RemoveStagedUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scratch directory could not be deleted.
    #[error("could not remove scratch directory '{path}': {source}")]
    RemoveScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workbook could not be closed after an earlier failure.
    #[error("could not close workbook: {detail}")]
    CloseWorkbook { detail: String },

    /// The automation host refused to quit; the process may be leaked.
    #[error("automation host '{host}' did not quit cleanly: {detail}")]
    QuitHost { host: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_are_client_errors() {
        assert_eq!(Sheet2PdfError::UnsupportedPlatform.status_code(), 400);
        assert_eq!(Sheet2PdfError::NoFileProvided.status_code(), 400);
        assert_eq!(
            Sheet2PdfError::InvalidUpload {
                reason: "truncated".into()
            }
            .status_code(),
            400
        );
    }

    #[test]
    fn automation_errors_are_server_errors() {
        let e = Sheet2PdfError::AutomationUnavailable {
            detail: "Excel.Application is not registered".into(),
        };
        assert_eq!(e.status_code(), 500);
        assert_eq!(Sheet2PdfError::automation("boom").status_code(), 500);
    }

    #[test]
    fn automation_display_is_host_message_verbatim() {
        let e = Sheet2PdfError::automation("Excel cannot open the file 'x.xlsx'");
        assert_eq!(e.to_string(), "Excel cannot open the file 'x.xlsx'");
    }

    #[test]
    fn platform_display_matches_wire_message() {
        assert_eq!(
            Sheet2PdfError::UnsupportedPlatform.to_string(),
            "This endpoint only works on Windows servers"
        );
        assert_eq!(Sheet2PdfError::NoFileProvided.to_string(), "No file provided");
    }

    #[test]
    fn quit_host_display() {
        let e = CleanupError::QuitHost {
            host: "excel".into(),
            detail: "RPC server unavailable".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("excel"), "got: {msg}");
        assert!(msg.contains("RPC server unavailable"), "got: {msg}");
    }
}

//! Result types: what a conversion produces and what goes on the wire.

use serde::{Deserialize, Serialize};

/// One worksheet rendered to PDF.
///
/// Serialises to exactly the object the endpoint returns in `pdfs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetExport {
    /// Sheet display name as reported by the host.
    pub name: String,
    /// `data:application/pdf;base64,…`
    pub pdf: String,
    /// Equal to `pdf` unless thumbnails are rasterised, in which case a
    /// `data:image/png;base64,…` URI.
    pub thumbnail: String,
}

/// Timing and size figures for one conversion. Logged, never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub sheet_count: usize,
    /// Sum of raw PDF sizes, before base64.
    pub total_pdf_bytes: u64,
    /// Time spent waiting for exclusive access to the host.
    pub queue_duration_ms: u64,
    /// Time between host launch and host release.
    pub host_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Complete result of converting one workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Sheets in the workbook's native order.
    pub sheets: Vec<SheetExport>,
    pub stats: ConversionStats,
}

/// JSON body of `POST /api/convert-excel`.
///
/// ```json
/// {"success": true, "pdfs": [{"name": "Q1", "pdf": "data:…", "thumbnail": "data:…"}]}
/// {"success": false, "error": "No file provided"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdfs: Option<Vec<SheetExport>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConvertResponse {
    pub fn converted(pdfs: Vec<SheetExport>) -> Self {
        Self {
            success: true,
            pdfs: Some(pdfs),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            pdfs: None,
            error: Some(error.into()),
        }
    }
}

//! # edgequake-sheet2pdf
//!
//! Convert Excel workbooks to one PDF per worksheet, over HTTP or locally.
//!
//! ## Why this crate?
//!
//! Rendering a spreadsheet faithfully means reproducing Excel's own
//! pagination, fonts, conditional formatting and charts. No library gets
//! that right, so this crate lets Excel do the rendering: it drives a hidden
//! Excel instance through COM automation, forces a printable layout on every
//! sheet, and exports each one with Excel's own PDF writer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /api/convert-excel (multipart "excelFile")
//!  │
//!  ├─ 0. Preflight  platform → upload present → automation installed
//!  ├─ 1. Stage      write upload to a fresh scratch dir (generated name)
//!  ├─ 2. Arbitrate  wait for exclusive host access (semaphore)
//!  ├─ 3. Export     launch Excel, per sheet: page setup + PDF (spawn_blocking)
//!  ├─ 4. Encode     PDF → data:application/pdf;base64 (+ optional PNG thumbnail)
//!  └─ 5. Respond    {"success": true, "pdfs": [{name, pdf, thumbnail}, …]}
//! ```
//!
//! Excel is quit, the permit released and the scratch directory removed on
//! every path out of step 3.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_sheet2pdf::{convert_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = convert_file("Q1.xlsx", &ConversionConfig::default()).await?;
//!     for sheet in &output.sheets {
//!         println!("{}: {} chars", sheet.name, sheet.pdf.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Serving the endpoint:
//!
//! ```rust,no_run
//! use edgequake_sheet2pdf::server::{serve, ServerConfig};
//! use edgequake_sheet2pdf::{ConversionConfig, Converter, ExcelHost};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), edgequake_sheet2pdf::Sheet2PdfError> {
//! let converter = Converter::new(Arc::new(ExcelHost::new()), ConversionConfig::default());
//! serve(ServerConfig::default(), converter).await
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sheet2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-sheet2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Platform
//!
//! Conversion needs Windows with Excel installed. On every other platform
//! the server still starts; the endpoint answers HTTP 400 and
//! [`client::upload_workbook`] can send workbooks to a Windows machine.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod host;
pub mod output;
pub mod pipeline;
pub mod preflight;
pub mod progress;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, ExportOptions, Orientation, PageSetup, PdfQuality,
    ThumbnailMode,
};
pub use convert::{convert_bytes, convert_file, convert_file_sync, Converter};
pub use error::{CleanupError, Sheet2PdfError};
pub use host::{AutomationHost, ExcelHost, HostSession};
pub use output::{ConversionOutput, ConversionStats, ConvertResponse, SheetExport};
pub use pipeline::stage::Upload;
pub use progress::{NoopProgressCallback, ProgressCallback, SheetProgressCallback};

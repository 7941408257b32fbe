//! Pipeline stages for workbook-to-PDF conversion.
//!
//! Each submodule implements exactly one step so it can be tested without
//! the others (and, for everything but `export`, without Excel).
//!
//! ## Data Flow
//!
//! ```text
//! stage ──▶ export ──▶ encode ──▶ thumbnail
//! (scratch)  (host)    (data URI)  (optional, pdfium)
//! ```
//!
//! 1. [`stage`]     — write the upload into a fresh scratch directory under a
//!    generated name
//! 2. [`export`]    — drive the automation host sheet by sheet; blocking,
//!    runs in `spawn_blocking`
//! 3. [`encode`]    — base64 `data:` URIs for PDFs and PNGs
//! 4. [`thumbnail`] — rasterise page 1 of each PDF when thumbnails are
//!    requested as images

pub mod encode;
pub mod export;
pub mod stage;
pub mod thumbnail;

//! The automation host seam.
//!
//! Everything this crate knows about rendering a workbook is a handful of
//! calls into an external spreadsheet application. [`AutomationHost`] is the
//! factory for such an application and [`HostSession`] is one live instance
//! of it with at most one workbook open.
//!
//! ```text
//! AutomationHost ──launch()──▶ HostSession ──▶ open → page_setup/export × N → close → quit
//!        │                          ▲
//!   HostArbiter (permit)       HostGuard (quit on every exit path)
//! ```
//!
//! All methods are blocking; callers run them inside `spawn_blocking`.

pub mod arbiter;
pub mod excel;
pub mod guard;

pub use arbiter::{HostArbiter, HostPermit};
pub use excel::ExcelHost;
pub use guard::HostGuard;

use crate::config::{ExportOptions, PageSetup};
use crate::error::Sheet2PdfError;
use std::path::Path;

/// A spreadsheet application that can be driven programmatically.
pub trait AutomationHost: Send + Sync {
    /// Short identifier used in logs, e.g. `"excel"`.
    fn name(&self) -> &str;

    /// Whether the current OS offers this automation interface at all.
    fn platform_supported(&self) -> bool;

    /// Verify the binding is installed without launching the application.
    fn check_available(&self) -> Result<(), Sheet2PdfError>;

    /// Start a new application instance: invisible, alerts disabled.
    fn launch(&self) -> Result<Box<dyn HostSession>, Sheet2PdfError>;
}

/// One running application instance.
///
/// Worksheet indices are 1-based, in the host's native order.
pub trait HostSession: Send {
    fn open_workbook(&mut self, path: &Path) -> Result<(), Sheet2PdfError>;

    fn worksheet_count(&mut self) -> Result<usize, Sheet2PdfError>;

    fn worksheet_name(&mut self, index: usize) -> Result<String, Sheet2PdfError>;

    fn apply_page_setup(&mut self, index: usize, setup: &PageSetup) -> Result<(), Sheet2PdfError>;

    /// Export one worksheet as a PDF written to `output`.
    fn export_pdf(
        &mut self,
        index: usize,
        output: &Path,
        options: &ExportOptions,
    ) -> Result<(), Sheet2PdfError>;

    fn close_workbook(&mut self, save_changes: bool) -> Result<(), Sheet2PdfError>;

    /// Terminate the application instance.
    fn quit(&mut self) -> Result<(), Sheet2PdfError>;
}

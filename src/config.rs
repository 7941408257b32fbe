//! Configuration types for workbook-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The defaults reproduce the layout the
//! endpoint has always produced: every sheet one page wide, landscape,
//! standard-quality PDF, print areas ignored.

use crate::error::Sheet2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a workbook conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_sheet2pdf::{ConversionConfig, ThumbnailMode};
///
/// let config = ConversionConfig::builder()
///     .thumbnail(ThumbnailMode::Rasterize { max_pixels: 320 })
///     .max_concurrent_hosts(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Print layout forced onto every worksheet before export.
    pub page_setup: PageSetup,

    /// Parameters of the fixed-format export call.
    pub export: ExportOptions,

    /// How the `thumbnail` field of each sheet is produced. Default: [`ThumbnailMode::Duplicate`].
    pub thumbnail: ThumbnailMode,

    /// Number of automation host instances allowed to run at once. Default: 1.
    ///
    /// Excel registers a single COM server per desktop session; two
    /// instances driven in parallel routinely steal each other's dialogs and
    /// clipboard. Raise this only on hosts where that has been verified safe.
    pub max_concurrent_hosts: usize,

    /// Directory under which per-request scratch directories are created.
    /// If None, uses the system temp directory.
    pub scratch_root: Option<PathBuf>,

    /// Optional per-sheet progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_setup: PageSetup::default(),
            export: ExportOptions::default(),
            thumbnail: ThumbnailMode::default(),
            max_concurrent_hosts: 1,
            scratch_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("page_setup", &self.page_setup)
            .field("export", &self.export)
            .field("thumbnail", &self.thumbnail)
            .field("max_concurrent_hosts", &self.max_concurrent_hosts)
            .field("scratch_root", &self.scratch_root)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SheetProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_setup(mut self, setup: PageSetup) -> Self {
        self.config.page_setup = setup;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.page_setup.orientation = orientation;
        self
    }

    pub fn export_options(mut self, export: ExportOptions) -> Self {
        self.config.export = export;
        self
    }

    pub fn ignore_print_areas(mut self, v: bool) -> Self {
        self.config.export.ignore_print_areas = v;
        self
    }

    pub fn thumbnail(mut self, mode: ThumbnailMode) -> Self {
        self.config.thumbnail = mode;
        self
    }

    pub fn max_concurrent_hosts(mut self, n: usize) -> Self {
        self.config.max_concurrent_hosts = n;
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Sheet2PdfError> {
        let c = &self.config;
        if c.max_concurrent_hosts == 0 {
            return Err(Sheet2PdfError::InvalidConfig(
                "max_concurrent_hosts must be ≥ 1".into(),
            ));
        }
        if c.page_setup.fit_to_pages_wide == 0 {
            return Err(Sheet2PdfError::InvalidConfig(
                "fit_to_pages_wide must be ≥ 1".into(),
            ));
        }
        if c.page_setup.fit_to_pages_tall == Some(0) {
            return Err(Sheet2PdfError::InvalidConfig(
                "fit_to_pages_tall must be ≥ 1 or unconstrained".into(),
            ));
        }
        if let ThumbnailMode::Rasterize { max_pixels } = c.thumbnail {
            if !(32..=2000).contains(&max_pixels) {
                return Err(Sheet2PdfError::InvalidConfig(format!(
                    "thumbnail max_pixels must be 32–2000, got {}",
                    max_pixels
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Layout & export parameters ───────────────────────────────────────────

/// Page orientation, numbered as Excel's `XlPageOrientation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
}

impl Orientation {
    pub fn excel_code(self) -> i32 {
        match self {
            Orientation::Portrait => 1,
            Orientation::Landscape => 2,
        }
    }
}

/// Print layout applied to each worksheet.
///
/// Zoom-based scaling is always switched off so that the fit-to-pages
/// values take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSetup {
    pub orientation: Orientation,
    /// Pages across. Default: 1.
    pub fit_to_pages_wide: u32,
    /// Pages down; None leaves the height unconstrained. Default: None.
    pub fit_to_pages_tall: Option<u32>,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            orientation: Orientation::Landscape,
            fit_to_pages_wide: 1,
            fit_to_pages_tall: None,
        }
    }
}

/// Excel `XlFixedFormatQuality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfQuality {
    #[default]
    Standard,
    Minimum,
}

impl PdfQuality {
    pub fn excel_code(self) -> i32 {
        match self {
            PdfQuality::Standard => 0,
            PdfQuality::Minimum => 1,
        }
    }
}

/// Arguments of `Worksheet.ExportAsFixedFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub quality: PdfQuality,
    pub include_doc_properties: bool,
    pub ignore_print_areas: bool,
    pub open_after_publish: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            quality: PdfQuality::Standard,
            include_doc_properties: true,
            ignore_print_areas: true,
            open_after_publish: false,
        }
    }
}

/// How the `thumbnail` field of a [`crate::output::SheetExport`] is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThumbnailMode {
    /// The thumbnail is the full PDF data URI, byte-for-byte. (default)
    ///
    /// Existing front-ends render the thumbnail with a PDF viewer and rely
    /// on this.
    #[default]
    Duplicate,
    /// Rasterise the first page with pdfium into a PNG data URI whose
    /// longest edge is at most `max_pixels`.
    Rasterize { max_pixels: u32 },
}

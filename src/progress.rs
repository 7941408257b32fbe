//! Progress-callback trait for per-sheet conversion events.
//!
//! Inject an [`Arc<dyn SheetProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the host exports each worksheet. The CLI uses this to drive an
//! indicatif progress bar; the HTTP server leaves it unset.
//!
//! Callbacks are invoked from the blocking thread that drives the automation
//! host, so implementations must be `Send + Sync` and should return quickly.
//!
//! # Example
//!
//! ```rust
//! use edgequake_sheet2pdf::{ConversionConfig, SheetProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     exported: Arc<AtomicUsize>,
//! }
//!
//! impl SheetProgressCallback for CountingCallback {
//!     fn on_sheet_complete(&self, index: usize, total: usize, name: &str, pdf_len: usize) {
//!         self.exported.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Sheet {}/{} '{}' done ({} bytes)", index, total, name, pdf_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     exported: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn SheetProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the converter as it processes each worksheet.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Sheets are always processed in order, one at a time.
pub trait SheetProgressCallback: Send + Sync {
    /// Called once the workbook is open and its sheet count is known.
    fn on_conversion_start(&self, total_sheets: usize) {
        let _ = total_sheets;
    }

    /// Called before the page setup of a sheet is applied.
    ///
    /// # Arguments
    /// * `index` — 1-indexed sheet position
    /// * `total` — sheets in the workbook
    /// * `name`  — sheet display name
    fn on_sheet_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a sheet's PDF has been exported and read back.
    ///
    /// `pdf_len` is the size of the raw PDF in bytes.
    fn on_sheet_complete(&self, index: usize, total: usize, name: &str, pdf_len: usize) {
        let _ = (index, total, name, pdf_len);
    }

    /// Called when a sheet fails. The conversion stops after this call.
    fn on_sheet_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the last sheet, only on success.
    fn on_conversion_complete(&self, total_sheets: usize) {
        let _ = total_sheets;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SheetProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn SheetProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        names: Mutex<Vec<String>>,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl SheetProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_sheets: usize) {
            self.started_total.store(total_sheets, Ordering::SeqCst);
        }

        fn on_sheet_start(&self, _index: usize, _total: usize, name: &str) {
            self.names.lock().unwrap().push(name.to_string());
        }

        fn on_sheet_complete(&self, _index: usize, _total: usize, _name: &str, _pdf_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_sheet_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(3);
        cb.on_sheet_start(1, 3, "Summary");
        cb.on_sheet_complete(1, 3, "Summary", 1024);
        cb.on_sheet_error(2, 3, "export failed");
        cb.on_conversion_complete(3);
    }

    #[test]
    fn tracking_callback_receives_events_in_order() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(2);
        tracker.on_sheet_start(1, 2, "Jan");
        tracker.on_sheet_complete(1, 2, "Jan", 10);
        tracker.on_sheet_start(2, 2, "Feb");
        tracker.on_sheet_error(2, 2, "host crashed");

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.names.lock().unwrap(), vec!["Jan", "Feb"]);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(1);
        cb.on_sheet_complete(1, 1, "Only", 512);
    }
}

//! Staging: put the uploaded bytes somewhere the automation host can open.
//!
//! Excel opens documents by path, so each upload is written into its own
//! freshly created scratch directory. The caller's filename is never used to
//! build the path; only its extension survives (Excel picks the file format
//! from it), and only if it is short and alphanumeric.

use crate::error::{CleanupError, Sheet2PdfError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension used when the uploaded name has none we trust.
const FALLBACK_EXTENSION: &str = "xlsx";

/// An uploaded workbook, still in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename as supplied by the caller. Used for logging only.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An upload written to disk inside its own scratch directory.
///
/// Dropping it removes the directory (via [`TempDir`]); [`StagedUpload::cleanup`]
/// does the same but reports what could not be removed.
#[derive(Debug)]
pub struct StagedUpload {
    original_name: String,
    path: PathBuf,
    scratch: TempDir,
}

impl StagedUpload {
    /// Absolute path of the staged workbook.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The per-request scratch directory; exported PDFs are written here too.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Delete the staged file and the scratch directory.
    ///
    /// Best effort: every failure is logged at `warn` and returned, none is
    /// raised.
    pub fn cleanup(self) -> Vec<CleanupError> {
        let mut issues = Vec::new();

        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                issues.push(CleanupError::RemoveStagedUpload {
                    path: self.path.clone(),
                    source: e,
                });
            }
        }

        let dir = self.scratch.path().to_path_buf();
        if let Err(e) = self.scratch.close() {
            issues.push(CleanupError::RemoveScratchDir { path: dir, source: e });
        } else {
            debug!("Removed scratch directory {}", dir.display());
        }

        for issue in &issues {
            warn!("{}", issue);
        }
        issues
    }
}

/// Extension to give the staged copy of `file_name`.
///
/// Accepts 1–5 ASCII alphanumerics (`xls`, `xlsx`, `xlsm`, `xlsb`, `ods`, …),
/// lower-cased; anything else falls back to `xlsx`.
pub fn safe_extension(file_name: &str) -> String {
    // Browsers on Windows may send the full client path.
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    Path::new(base)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| (1..=5).contains(&e.len()) && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Write `upload` into a new scratch directory under `scratch_root`
/// (the system temp directory when `None`).
pub async fn stage_upload(
    upload: &Upload,
    scratch_root: Option<&Path>,
) -> Result<StagedUpload, Sheet2PdfError> {
    let root = match scratch_root {
        Some(r) => r.to_path_buf(),
        None => std::env::temp_dir(),
    };
    // Excel resolves relative paths against its own working directory.
    let root = std::path::absolute(&root).map_err(|e| Sheet2PdfError::Staging {
        path: root.clone(),
        source: e,
    })?;

    let scratch = tempfile::Builder::new()
        .prefix("sheet2pdf-")
        .tempdir_in(&root)
        .map_err(|e| Sheet2PdfError::Staging {
            path: root.clone(),
            source: e,
        })?;

    let file_name = format!("upload-{}.{}", Uuid::new_v4(), safe_extension(&upload.file_name));
    let path = scratch.path().join(file_name);

    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| Sheet2PdfError::Staging {
            path: path.clone(),
            source: e,
        })?;

    debug!(
        "Staged '{}' ({} bytes) at {}",
        upload.file_name,
        upload.bytes.len(),
        path.display()
    );

    Ok(StagedUpload {
        original_name: upload.file_name.clone(),
        path,
        scratch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("Q1.xlsx"), "xlsx");
        assert_eq!(safe_extension("Budget.XLSM"), "xlsm");
        assert_eq!(safe_extension("old.xls"), "xls");
        assert_eq!(safe_extension("no_extension"), "xlsx");
        assert_eq!(safe_extension(""), "xlsx");
        assert_eq!(safe_extension("evil.x/../../y"), "xlsx");
        assert_eq!(safe_extension("weird.xl$x"), "xlsx");
        assert_eq!(safe_extension("long.extension"), "xlsx");
        assert_eq!(safe_extension(r"C:\Users\me\Desktop\Q1.xlsb"), "xlsb");
        assert_eq!(safe_extension("../../etc/passwd.xlsx"), "xlsx");
    }

    #[tokio::test]
    async fn staged_name_ignores_caller_path() {
        let root = tempfile::tempdir().unwrap();
        let upload = Upload::new("../../outside.xlsx", b"PK\x03\x04".to_vec());

        let staged = stage_upload(&upload, Some(root.path())).await.unwrap();

        assert!(staged.path().starts_with(root.path()));
        assert_eq!(staged.path().parent(), Some(staged.scratch_dir()));
        let name = staged.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("upload-") && name.ends_with(".xlsx"), "got {name}");
        assert_eq!(staged.original_name(), "../../outside.xlsx");
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"PK\x03\x04");
        assert!(!root.path().join("outside.xlsx").exists());
        assert!(!root.path().parent().unwrap().join("outside.xlsx").exists());
    }

    #[tokio::test]
    async fn cleanup_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let staged = stage_upload(&Upload::new("a.xlsx", vec![1, 2, 3]), Some(root.path()))
            .await
            .unwrap();
        std::fs::write(staged.scratch_dir().join("leftover.pdf"), b"%PDF").unwrap();

        let issues = staged.cleanup();

        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn each_upload_gets_its_own_directory() {
        let root = tempfile::tempdir().unwrap();
        let upload = Upload::new("same.xlsx", vec![0]);
        let a = stage_upload(&upload, Some(root.path())).await.unwrap();
        let b = stage_upload(&upload, Some(root.path())).await.unwrap();
        assert_ne!(a.scratch_dir(), b.scratch_dir());
        assert_ne!(a.path(), b.path());
    }
}

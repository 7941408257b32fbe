//! Preconditions checked before a conversion touches the filesystem.
//!
//! The checks form a fixed, ordered fail-fast chain. The first failing
//! check decides the response; nothing is staged unless all pass.
//!
//! | # | Check | Failure | HTTP |
//! |---|-------|---------|------|
//! | 1 | [`Preflight::Platform`] | `UnsupportedPlatform` | 400 |
//! | 2 | [`Preflight::UploadPresent`] | `NoFileProvided` / `InvalidUpload` | 400 |
//! | 3 | [`Preflight::AutomationAvailable`] | `AutomationUnavailable` | 500 |

use crate::error::Sheet2PdfError;
use crate::host::AutomationHost;
use crate::pipeline::stage::Upload;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    Platform,
    UploadPresent,
    AutomationAvailable,
}

impl Preflight {
    /// Evaluation order.
    pub const CHAIN: [Preflight; 3] = [
        Preflight::Platform,
        Preflight::UploadPresent,
        Preflight::AutomationAvailable,
    ];
}

/// Run every check in [`Preflight::CHAIN`] order.
///
/// `upload` is the outcome of reading the request body: `Ok(None)` when no
/// file field was present. It is only inspected once the platform check has
/// passed, so an unsupported host always answers "platform unsupported",
/// whatever was sent.
pub fn run_preflight(
    host: &dyn AutomationHost,
    upload: Result<Option<Upload>, Sheet2PdfError>,
) -> Result<Upload, Sheet2PdfError> {
    let mut upload = Some(upload);
    let mut accepted = None;

    for check in Preflight::CHAIN {
        match check {
            Preflight::Platform => {
                if !host.platform_supported() {
                    return Err(Sheet2PdfError::UnsupportedPlatform);
                }
            }
            Preflight::UploadPresent => {
                let candidate = upload.take().unwrap_or(Ok(None))?;
                match candidate {
                    Some(u) if !u.bytes.is_empty() => accepted = Some(u),
                    _ => return Err(Sheet2PdfError::NoFileProvided),
                }
            }
            Preflight::AutomationAvailable => host.check_available()?,
        }
        debug!("preflight {:?} passed", check);
    }

    accepted.ok_or(Sheet2PdfError::NoFileProvided)
}

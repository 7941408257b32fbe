//! `data:` URI encoding for exported PDFs and rendered thumbnails.
//!
//! The endpoint returns binary documents inline in JSON, so every PDF goes
//! out as `data:application/pdf;base64,<…>` and every raster thumbnail as
//! `data:image/png;base64,<…>`.

use crate::error::Sheet2PdfError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";

/// Whether `bytes` start with the `%PDF` file signature.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub fn pdf_data_uri(pdf: &[u8]) -> String {
    let uri = data_uri(PDF_MIME, pdf);
    debug!("Encoded PDF {} bytes → {} chars", pdf.len(), uri.len());
    uri
}

/// PNG-encode an image and wrap it as a data URI.
pub fn png_data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(data_uri(PNG_MIME, &buf))
}

/// Split a base64 `data:` URI into its MIME type and decoded payload.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), Sheet2PdfError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Sheet2PdfError::InvalidDataUri {
            reason: "missing 'data:' prefix".into(),
        })?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Sheet2PdfError::InvalidDataUri {
            reason: "missing ',' separator".into(),
        })?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| Sheet2PdfError::InvalidDataUri {
            reason: format!("'{header}' is not base64-encoded"),
        })?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| Sheet2PdfError::InvalidDataUri {
            reason: e.to_string(),
        })?;
    Ok((mime.to_string(), bytes))
}

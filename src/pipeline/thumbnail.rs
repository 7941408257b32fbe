//! Raster thumbnails: render page 1 of each exported PDF with pdfium.
//!
//! Only used with [`crate::config::ThumbnailMode::Rasterize`]. pdfium is
//! loaded at runtime, from `PDFIUM_LIB_PATH` when set and from the system
//! library path otherwise, so the default (duplicate) mode never needs it.
//!
//! pdfium keeps thread-local state and is not async-safe, so rendering runs
//! inside `spawn_blocking`.

use crate::error::Sheet2PdfError;
use crate::pipeline::encode;
use crate::pipeline::export::ExportedSheet;
use pdfium_render::prelude::*;
use tracing::debug;

/// Render a PNG data-URI thumbnail for every sheet, in order.
pub async fn rasterize_first_pages(
    sheets: Vec<ExportedSheet>,
    max_pixels: u32,
) -> Result<(Vec<ExportedSheet>, Vec<String>), Sheet2PdfError> {
    tokio::task::spawn_blocking(move || {
        let thumbs = rasterize_blocking(&sheets, max_pixels)?;
        Ok((sheets, thumbs))
    })
    .await
    .map_err(|e| Sheet2PdfError::Internal(format!("Thumbnail task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path)?,
        _ => Pdfium::bind_to_system_library()?,
    };
    Ok(Pdfium::new(bindings))
}

fn rasterize_blocking(
    sheets: &[ExportedSheet],
    max_pixels: u32,
) -> Result<Vec<String>, Sheet2PdfError> {
    if sheets.is_empty() {
        return Ok(Vec::new());
    }

    let pdfium = bind_pdfium().map_err(|e| Sheet2PdfError::ThumbnailFailed {
        sheet: sheets[0].name.clone(),
        detail: format!(
            "cannot load pdfium ({:?}); install it or set PDFIUM_LIB_PATH=/path/to/libpdfium",
            e
        ),
    })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut thumbs = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        let failed = |detail: String| Sheet2PdfError::ThumbnailFailed {
            sheet: sheet.name.clone(),
            detail,
        };

        let document = pdfium
            .load_pdf_from_byte_slice(&sheet.pdf, None)
            .map_err(|e| failed(format!("{:?}", e)))?;
        let page = document
            .pages()
            .get(0)
            .map_err(|e| failed(format!("{:?}", e)))?;
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("{:?}", e)))?
            .as_image();

        debug!(
            "Thumbnail for '{}' → {}x{} px",
            sheet.name,
            image.width(),
            image.height()
        );
        thumbs.push(encode::png_data_uri(&image).map_err(|e| failed(e.to_string()))?);
    }

    Ok(thumbs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_sheets_needs_no_pdfium() {
        let (sheets, thumbs) = rasterize_first_pages(Vec::new(), 200).await.unwrap();
        assert!(sheets.is_empty());
        assert!(thumbs.is_empty());
    }
}

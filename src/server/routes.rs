//! Request handlers.

use super::AppState;
use crate::error::Sheet2PdfError;
use crate::output::ConvertResponse;
use crate::pipeline::stage::Upload;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

/// Name of the multipart field carrying the workbook.
pub const UPLOAD_FIELD: &str = "excelFile";

/// Fallback when the client sends no filename; only the extension matters.
const DEFAULT_FILE_NAME: &str = "upload.xlsx";

impl IntoResponse for Sheet2PdfError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Conversion failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(ConvertResponse::failed(self.to_string()))).into_response()
    }
}

/// `POST /api/convert-excel`
///
/// An `excelFile` part with no bytes counts as no file at all: the request
/// is answered 400 "No file provided" and nothing is staged.
pub async fn convert_excel(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, Sheet2PdfError> {
    let converter = &state.converter;

    // Nothing is buffered for a host that could never convert it.
    let upload = if converter.host().platform_supported() {
        read_upload(multipart).await
    } else {
        Ok(None)
    };

    let upload = converter.preflight(upload)?;
    info!("Received '{}' ({} bytes)", upload.file_name, upload.bytes.len());

    let output = converter.convert_checked(upload).await?;
    Ok(Json(ConvertResponse::converted(output.sheets)))
}

/// Pull the `excelFile` field out of the body. Other fields are skipped.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<Upload>, Sheet2PdfError> {
    let mut multipart = multipart.map_err(|e| Sheet2PdfError::InvalidUpload {
        reason: e.body_text(),
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Sheet2PdfError::InvalidUpload {
            reason: e.body_text(),
        })?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Sheet2PdfError::InvalidUpload {
                reason: e.body_text(),
            })?;
        return Ok(Some(Upload::new(file_name, bytes.to_vec())));
    }

    Ok(None)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub platform_supported: bool,
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "sheet2pdf",
        version: env!("CARGO_PKG_VERSION"),
        platform_supported: state.converter.host().platform_supported(),
    })
}

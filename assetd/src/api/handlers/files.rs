//! HTTP handlers for multipart uploads into the asset directory.

use std::io::Cursor;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::Method,
};
use tracing::{debug, instrument, warn};

use crate::AppState;
use crate::api::models::files::PathReport;
use crate::errors::{Error, Result};
use crate::storage::UploadPart;

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "files";

#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    summary = "Upload files",
    description = "Store every file sent under the `files` form field. Each file gets a fresh random name that keeps \
the part of its original filename after the first dot as extension. Non-file fields are ignored.",
    request_body(
        content_type = "multipart/form-data",
        description = "One or more files under the `files` field"
    ),
    responses(
        (status = 200, description = "Files stored, public paths in upload order", body = PathReport),
        (status = 400, description = "A filename has no extension"),
        (status = 405, description = "Method other than POST"),
        (status = 500, description = "Malformed or oversized body, or a storage failure")
    )
)]
#[instrument(skip_all)]
pub async fn upload_files(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Json<PathReport>> {
    let mut multipart = multipart.map_err(|e| Error::MultipartParse { message: e.body_text() })?;

    // Read the whole form before touching the disk: a body that turns out malformed or too large
    // must not leave any file behind.
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::MultipartParse { message: e.body_text() })? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        // Only file parts count. A plain `files` value has no filename, and a form submitted with
        // no file chosen sends an empty one.
        let Some(file_name) = field.file_name().filter(|name| !name.is_empty()).map(str::to_string) else {
            debug!("Ignoring `files` field without filename");
            continue;
        };

        let data = field.bytes().await.map_err(|e| Error::MultipartParse { message: e.body_text() })?;

        debug!(file_name = %file_name, bytes = data.len(), "Received upload part");
        parts.push(UploadPart::new(file_name, Cursor::new(data)));
    }

    let paths = state.store.store_all(parts).await?;

    Ok(Json(PathReport { path: paths }))
}

/// Answers every method but POST on the upload route. Nothing is read or stored.
pub async fn reject_method(method: Method) -> Error {
    warn!(method = %method, "Invalid HTTP method for upload");
    Error::MethodNotAllowed { method: method.to_string() }
}

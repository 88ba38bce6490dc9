//! HTTP handlers for stored asset serving.
//!
//! Two routes read files:
//!
//! - `<prefix>` and `<prefix>{*path}` resolve the full request path (minus its leading `/`) against
//!   the web root, which is the working directory by default. With the default layout,
//!   `/assets/<uuid>.png` reads `./assets/<uuid>.png`.
//! - `<prefix>` without its trailing slash (`/assets`) reads the asset directory itself.
//!
//! Everything else that no route claims is sent to the asset prefix with a permanent redirect.

use std::io::SeekFrom;
use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use crate::AppState;
use crate::content_type::{self, SNIFF_LEN};
use crate::errors::{Error, Result};

/// File served when a directory is requested
const INDEX_FILE: &str = "index.html";

/// Permanent (301) redirect to the asset prefix.
pub async fn redirect_to_assets(State(state): State<AppState>, uri: Uri) -> Response {
    debug!(from = %uri.path(), "Redirecting to asset prefix");
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.store.public_prefix().to_string())],
    )
        .into_response()
}

/// `GET /assets`: the asset directory itself, which only has content when it holds an index file.
pub async fn serve_asset_dir(State(state): State<AppState>) -> Result<Response> {
    serve_file(state.store.dir(), "").await
}

/// `GET /assets/`
pub async fn serve_prefix_root(State(state): State<AppState>) -> Result<Response> {
    serve_from_web_root(&state, "").await
}

/// `GET /assets/{*path}`
pub async fn serve_prefixed(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response> {
    serve_from_web_root(&state, &path).await
}

async fn serve_from_web_root(state: &AppState, rest: &str) -> Result<Response> {
    let request_path = format!("{}{rest}", state.store.public_prefix());
    serve_file(&state.config.assets.web_root, &request_path).await
}

/// Streams `root/relative` with its content type.
///
/// Directories are served through their index file. Paths with a `..` segment are refused, missing
/// files and directories without an index are [`Error::NotFound`].
#[instrument(skip(root), fields(root = %root.display()))]
pub async fn serve_file(root: &FsPath, relative: &str) -> Result<Response> {
    let not_found = || Error::NotFound {
        path: relative.to_string(),
    };

    if relative.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(Error::BadPath {
            path: relative.to_string(),
        });
    }

    let mut path = root.join(relative.trim_start_matches('/'));
    let mut metadata = fs::metadata(&path).await.map_err(|_| not_found())?;

    if metadata.is_dir() {
        path.push(INDEX_FILE);
        metadata = fs::metadata(&path).await.map_err(|_| not_found())?;
    }

    if !metadata.is_file() {
        return Err(not_found());
    }

    let io_error = |e: std::io::Error| Error::Other(anyhow::Error::new(e).context(format!("failed to read {}", path.display())));

    let mut file = File::open(&path).await.map_err(io_error)?;

    let mime = match content_type::from_path(&path) {
        Some(mime) => mime,
        None => {
            let mut head = Vec::with_capacity(SNIFF_LEN);
            (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await.map_err(io_error)?;
            file.seek(SeekFrom::Start(0)).await.map_err(io_error)?;
            content_type::sniff(&head)
        }
    };

    debug!(path = %path.display(), content_type = mime, bytes = metadata.len(), "Serving file");

    let headers = [
        (header::CONTENT_TYPE, mime.to_string()),
        (header::CONTENT_LENGTH, metadata.len().to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

//! OpenAPI documentation for the upload API.
//!
//! Asset reads and the root redirect are plain static-file routes and are left out of the
//! document.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(title = "assetd", description = "Upload files and get back the public paths they are served from."),
    paths(api::handlers::files::upload_files),
    components(schemas(api::models::files::PathReport)),
    tags((name = "files", description = "File uploads"))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_upload_route() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/files"));
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("PathReport"));
    }
}

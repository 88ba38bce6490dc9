//! API layer for HTTP request handling and data models.
//!
//! This module contains the HTTP surface, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Uploads** (`POST /api/files`): multipart upload, answers with a path report
//! - **Assets** (`GET /assets/*`): stored files, served with an extension-derived content type
//! - **Root** (`/`): permanent redirect to the asset prefix
//!
//! # OpenAPI Documentation
//!
//! The upload endpoint is documented with `utoipa`. The document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;

//! HTTP request handlers.
//!
//! # Handler Modules
//!
//! - [`assets`]: Stored file serving and the root redirect
//! - [`files`]: Multipart upload into the asset directory
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to a bare HTTP status code.

pub mod assets;
pub mod files;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid or unusable configuration, fatal at startup
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// Request used a method the route does not accept
    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String },

    /// Multipart body could not be decoded, or exceeded the size limit
    #[error("Failed to parse multipart form: {message}")]
    MultipartParse { message: String },

    /// Uploaded filename has no usable extension
    #[error("Invalid upload filename {file_name:?}")]
    InvalidFileName { file_name: String },

    /// Storage file could not be created
    #[error("Failed to create {}", path.display())]
    StorageCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying upload bytes into a storage file failed
    #[error("Failed to write {}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested file does not exist
    #[error("{path} not found")]
    NotFound { path: String },

    /// Request path escapes the served directory
    #[error("Invalid request path {path}")]
    BadPath { path: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::MultipartParse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidFileName { .. } => StatusCode::BAD_REQUEST,
            Error::StorageCreate { .. } | Error::StorageWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::BadPath { .. } => StatusCode::BAD_REQUEST,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::StorageCreate { .. } | Error::StorageWrite { .. } | Error::Configuration { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {}", self.chain());
            }
            Error::MultipartParse { .. } => {
                tracing::warn!("Upload rejected: {}", self);
            }
            Error::MethodNotAllowed { .. } | Error::InvalidFileName { .. } | Error::NotFound { .. } | Error::BadPath { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        // Clients only ever see the status code
        self.status_code().into_response()
    }
}

impl Error {
    /// Renders the error followed by each of its sources, `: `-separated
    fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let io = || std::io::Error::other("disk full");

        assert_eq!(
            Error::MethodNotAllowed { method: "GET".into() }.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            Error::MultipartParse { message: "eof".into() }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::StorageCreate {
                path: "assets/x.png".into(),
                source: io(),
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::StorageWrite {
                path: "assets/x.png".into(),
                source: io(),
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Error::NotFound { path: "x".into() }.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::BadPath { path: "../x".into() }.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_log_message_includes_source_chain() {
        let err = Error::StorageWrite {
            path: "assets/x.png".into(),
            source: std::io::Error::other("connection reset"),
        };

        assert_eq!(err.chain(), "Failed to write assets/x.png: connection reset");
    }

    #[tokio::test]
    async fn test_response_has_no_body() {
        let response = Error::StorageCreate {
            path: "assets/secret-layout/x.png".into(),
            source: std::io::Error::other("permission denied"),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}

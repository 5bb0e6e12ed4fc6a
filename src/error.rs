//! Error type shared by storage backends and the content manager.

use thiserror::Error;

use crate::domain::{ContentId, Permission};

/// Errors that can occur while reading or writing content
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content not found: {0}")]
    ContentNotFound(ContentId),

    #[error("File not found in content {content_id}: {path}")]
    FileNotFound { content_id: ContentId, path: String },

    #[error("User {user} lacks {permission} permission on content {content_id}")]
    PermissionDenied {
        content_id: ContentId,
        user: String,
        permission: Permission,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode {document}: {source}")]
    Decode {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid content file path: {0:?}")]
    InvalidPath(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),
}

impl ContentError {
    /// True for both missing content and missing files
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContentError::ContentNotFound(_) | ContentError::FileNotFound { .. }
        )
    }

    pub(crate) fn decode(document: impl Into<String>, source: serde_json::Error) -> Self {
        ContentError::Decode {
            document: document.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for ContentError {
    fn from(err: tokio::task::JoinError) -> Self {
        ContentError::Storage(format!("Background task failed: {}", err))
    }
}

/// Result alias for content operations
pub type Result<T, E = ContentError> = std::result::Result<T, E>;

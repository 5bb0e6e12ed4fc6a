//! Storage contract for content objects.
//!
//! Every persistence backend implements [`ContentStorage`]. The content
//! manager only ever talks to this trait, so backends are interchangeable.
//!
//! Backends shipped with the crate:
//! - [`InMemoryContentStorage`]: maps behind a lock, for tests and embedding
//! - [`FileContentStorage`]: one directory per content object

pub mod file;
pub mod memory;

use std::collections::HashSet;
use std::path::{Component, Path};

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::{ContentId, ContentParameters, Metadata, Permission, User};
use crate::error::{ContentError, Result};

pub use file::FileContentStorage;
pub use memory::InMemoryContentStorage;

/// Readable byte stream for a content file
pub type ContentStream = Box<dyn AsyncRead + Send + Unpin>;

/// Persistence backend for content objects.
///
/// Implementations must satisfy these invariants:
/// - `create_content` is a single logical commit: on failure no part of the
///   object is visible.
/// - `create_content_id` never returns an id that is in use or was already
///   handed out by the same backend.
/// - `delete_content` removes every file of the object and succeeds when the
///   object does not exist.
/// - The canonical documents live at the reserved paths
///   [`crate::config::paths::METADATA_FILE`] and
///   [`crate::config::paths::CONTENT_FILE`]; `get_content_files` lists only
///   the other files.
#[async_trait]
pub trait ContentStorage: Send + Sync {
    /// Allocate a fresh content id
    async fn create_content_id(&self) -> Result<ContentId>;

    /// Persist the canonical documents of a content object.
    ///
    /// A supplied `content_id` is used as-is; for an existing object the
    /// documents are replaced and its other files kept.
    async fn create_content(
        &self,
        metadata: &Metadata,
        parameters: &ContentParameters,
        user: &User,
        content_id: Option<ContentId>,
    ) -> Result<ContentId>;

    /// Write or overwrite one file of an existing object.
    ///
    /// When a user is given it must hold [`Permission::Edit`].
    async fn add_content_file(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        stream: ContentStream,
        user: Option<&User>,
    ) -> Result<()>;

    /// Remove an object and all its files
    async fn delete_content(&self, content_id: &ContentId) -> Result<()>;

    /// Check whether an object has been committed
    async fn content_exists(&self, content_id: &ContentId) -> Result<bool>;

    /// Open one file of an object for reading. Requires [`Permission::View`].
    async fn get_content_file_stream(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        user: &User,
    ) -> Result<ContentStream>;

    /// List the auxiliary files of an object. Requires [`Permission::View`].
    async fn get_content_files(&self, content_id: &ContentId, user: &User) -> Result<Vec<String>>;

    /// Permissions `user` holds on the object
    async fn get_user_permissions(
        &self,
        content_id: &ContentId,
        user: &User,
    ) -> Result<HashSet<Permission>>;

    /// Ids of all committed objects
    async fn list_content(&self) -> Result<Vec<ContentId>>;
}

/// Reject paths that are empty, absolute, or step outside the object.
///
/// Backslashes are treated as separators so Windows-authored packages map to
/// the same storage path.
pub fn validate_relative_path(relative_path: &str) -> Result<String> {
    let normalized = relative_path.replace('\\', "/");
    if normalized.is_empty() || normalized.starts_with('/') {
        return Err(ContentError::InvalidPath(relative_path.to_string()));
    }

    let mut parts = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => return Err(ContentError::InvalidPath(relative_path.to_string())),
            },
            Component::CurDir => {}
            _ => return Err(ContentError::InvalidPath(relative_path.to_string())),
        }
    }

    if parts.is_empty() {
        return Err(ContentError::InvalidPath(relative_path.to_string()));
    }

    Ok(parts.join("/"))
}

/// Fail with `PermissionDenied` unless `permission` is granted
pub(crate) fn require_permission(
    granted: &HashSet<Permission>,
    permission: Permission,
    content_id: &ContentId,
    user: &User,
) -> Result<()> {
    if granted.contains(&permission) {
        Ok(())
    } else {
        Err(ContentError::PermissionDenied {
            content_id: content_id.clone(),
            user: user.id.clone(),
            permission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_relative_path_accepts_nested() {
        assert_eq!(validate_relative_path("images/a.png").unwrap(), "images/a.png");
        assert_eq!(validate_relative_path("./audio/x.mp3").unwrap(), "audio/x.mp3");
        assert_eq!(validate_relative_path("videos\\clip.mp4").unwrap(), "videos/clip.mp4");
    }

    #[test]
    fn test_validate_relative_path_rejects_escapes() {
        for bad in ["", "/etc/passwd", "../secret", "images/../../x", ".", "\\abs"] {
            assert!(
                matches!(validate_relative_path(bad), Err(ContentError::InvalidPath(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_require_permission() {
        let user = User::new("u1", "Una");
        let id = ContentId::new("c1");
        let granted: HashSet<Permission> = [Permission::View].into_iter().collect();

        assert!(require_permission(&granted, Permission::View, &id, &user).is_ok());
        match require_permission(&granted, Permission::Edit, &id, &user) {
            Err(ContentError::PermissionDenied { permission, user, .. }) => {
                assert_eq!(permission, Permission::Edit);
                assert_eq!(user, "u1");
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }
}

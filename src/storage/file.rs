//! Directory-per-object content storage.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/
//! ├── .lock                     # Commit lock
//! └── <content_id>/
//!     ├── h5p.json              # Metadata
//!     ├── content.json          # Content parameters
//!     └── images/a.png          # Auxiliary files
//! ```
//!
//! New objects are written into a hidden staging directory under the root
//! and renamed into place, so an object directory never exists without both
//! documents.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::{require_permission, validate_relative_path, ContentStorage, ContentStream};
use crate::config::paths::{is_reserved, CONTENT_FILE, METADATA_FILE};
use crate::domain::{ContentId, ContentParameters, Metadata, Permission, User};
use crate::error::{ContentError, Result};

const LOCK_FILE: &str = ".lock";
const STAGING_PREFIX: &str = ".staging-";

/// Filesystem-backed content storage.
///
/// Single-tenant: every user holds every permission.
pub struct FileContentStorage {
    root: PathBuf,
    /// Ids handed out by `create_content_id` in this process
    allocated: Mutex<HashSet<ContentId>>,
}

impl FileContentStorage {
    /// Create a store rooted at `root` (created lazily on first commit)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allocated: Mutex::new(HashSet::new()),
        }
    }

    /// Create a store and make sure its root directory exists
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).await?;
        Ok(store)
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one content object
    fn content_dir(&self, content_id: &ContentId) -> Result<PathBuf> {
        let id = content_id.as_str();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\'])
            && id != LOCK_FILE;
        if !valid {
            return Err(ContentError::InvalidPath(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    /// Path of one file inside a content object
    fn file_path(&self, content_id: &ContentId, relative_path: &str) -> Result<PathBuf> {
        let relative = validate_relative_path(relative_path)?;
        Ok(self.content_dir(content_id)?.join(relative))
    }

    async fn ensure_exists(&self, content_id: &ContentId) -> Result<()> {
        if self.content_exists(content_id).await? {
            Ok(())
        } else {
            Err(ContentError::ContentNotFound(content_id.clone()))
        }
    }
}

fn serialize_document<T: serde::Serialize>(name: &str, document: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(document)
        .map_err(|e| ContentError::Storage(format!("Failed to serialize {}: {}", name, e)))
}

/// Write both documents for `target` while holding the root commit lock
fn commit_documents(
    root: &Path,
    target: &Path,
    metadata: &[u8],
    parameters: &[u8],
) -> std::io::Result<()> {
    std::fs::create_dir_all(root)?;

    let lock = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(root.join(LOCK_FILE))?;
    lock.lock_exclusive()?;

    if target.is_dir() {
        replace_documents(root, target, metadata, parameters)
    } else {
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)?;
        std::fs::write(staging.path().join(CONTENT_FILE), parameters)?;
        std::fs::write(staging.path().join(METADATA_FILE), metadata)?;
        // The emptied TempDir is dropped afterwards; its cleanup is a no-op
        std::fs::rename(staging.path(), target)
    }
}

/// Swap both documents of an existing object, keeping its other files.
///
/// Both documents are written and synced before either is moved into place.
/// `h5p.json` goes last; if it cannot be persisted the previous
/// `content.json` is put back, so a failed commit leaves the object as it was.
fn replace_documents(
    root: &Path,
    target: &Path,
    metadata: &[u8],
    parameters: &[u8],
) -> std::io::Result<()> {
    let parameters_file = stage_document(root, parameters)?;
    let metadata_file = stage_document(root, metadata)?;

    let parameters_path = target.join(CONTENT_FILE);
    let previous = match std::fs::read(&parameters_path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    parameters_file.persist(&parameters_path).map_err(|e| e.error)?;
    if let Err(e) = metadata_file.persist(target.join(METADATA_FILE)) {
        if let Err(restore) = restore_document(root, &parameters_path, previous.as_deref()) {
            warn!(path = %parameters_path.display(), error = %restore, "Failed to restore document");
        }
        return Err(e.error);
    }
    Ok(())
}

fn stage_document(root: &Path, bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let mut temp = tempfile::NamedTempFile::new_in(root)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

fn restore_document(root: &Path, destination: &Path, previous: Option<&[u8]>) -> std::io::Result<()> {
    match previous {
        Some(bytes) => {
            stage_document(root, bytes)?
                .persist(destination)
                .map_err(|e| e.error)?;
            Ok(())
        }
        None => std::fs::remove_file(destination),
    }
}

/// Relative paths of every auxiliary file below `dir`, sorted
fn walk_content_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        // Names that are not UTF-8 cannot be addressed through the API
        let relative: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        let Some(relative) = relative else {
            warn!(path = %entry.path().display(), "Skipping file with non UTF-8 name");
            continue;
        };
        let relative = relative.join("/");

        if !is_reserved(&relative) {
            files.push(relative);
        }
    }

    files.sort();
    Ok(files)
}

#[async_trait]
impl ContentStorage for FileContentStorage {
    async fn create_content_id(&self) -> Result<ContentId> {
        let mut allocated = self.allocated.lock().await;
        loop {
            let id = ContentId::new(Uuid::new_v4().simple().to_string());
            let taken = fs::try_exists(self.content_dir(&id)?).await?;
            if !taken && allocated.insert(id.clone()) {
                return Ok(id);
            }
        }
    }

    async fn create_content(
        &self,
        metadata: &Metadata,
        parameters: &ContentParameters,
        _user: &User,
        content_id: Option<ContentId>,
    ) -> Result<ContentId> {
        let metadata_bytes = serialize_document(METADATA_FILE, metadata)?;
        let parameters_bytes = serialize_document(CONTENT_FILE, parameters)?;

        let id = match content_id {
            Some(id) => id,
            None => self.create_content_id().await?,
        };
        let root = self.root.clone();
        let target = self.content_dir(&id)?;

        tokio::task::spawn_blocking(move || {
            commit_documents(&root, &target, &metadata_bytes, &parameters_bytes)
        })
        .await?
        .map_err(|e| ContentError::Storage(format!("Failed to commit content {}: {}", id, e)))?;

        self.allocated.lock().await.insert(id.clone());
        debug!(content_id = %id, root = %self.root.display(), "Committed content");
        Ok(id)
    }

    async fn add_content_file(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        mut stream: ContentStream,
        user: Option<&User>,
    ) -> Result<()> {
        let destination = self.file_path(content_id, relative_path)?;
        self.ensure_exists(content_id).await?;
        if let Some(user) = user {
            let granted = self.get_user_permissions(content_id, user).await?;
            require_permission(&granted, Permission::Edit, content_id, user)?;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&destination).await?;
        let written = match tokio::io::copy(&mut stream, &mut file).await {
            Ok(_) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&destination).await {
                warn!(path = %destination.display(), error = %cleanup, "Failed to remove partial file");
            }
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete_content(&self, content_id: &ContentId) -> Result<()> {
        let dir = self.content_dir(content_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(%content_id, "Deleted content");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn content_exists(&self, content_id: &ContentId) -> Result<bool> {
        let dir = self.content_dir(content_id)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        match fs::metadata(dir.join(METADATA_FILE)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_content_file_stream(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        user: &User,
    ) -> Result<ContentStream> {
        let path = self.file_path(content_id, relative_path)?;
        self.ensure_exists(content_id).await?;
        let granted = self.get_user_permissions(content_id, user).await?;
        require_permission(&granted, Permission::View, content_id, user)?;

        let not_found = || ContentError::FileNotFound {
            content_id: content_id.clone(),
            path: relative_path.to_string(),
        };
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }

        let file = fs::File::open(&path).await?;
        Ok(Box::new(file))
    }

    async fn get_content_files(&self, content_id: &ContentId, user: &User) -> Result<Vec<String>> {
        self.ensure_exists(content_id).await?;
        let granted = self.get_user_permissions(content_id, user).await?;
        require_permission(&granted, Permission::View, content_id, user)?;

        let dir = self.content_dir(content_id)?;
        let files = tokio::task::spawn_blocking(move || walk_content_files(&dir)).await??;
        Ok(files)
    }

    async fn get_user_permissions(
        &self,
        content_id: &ContentId,
        _user: &User,
    ) -> Result<HashSet<Permission>> {
        self.ensure_exists(content_id).await?;
        Ok(Permission::all())
    }

    async fn list_content(&self) -> Result<Vec<ContentId>> {
        let mut ids = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with('.') {
                    continue;
                }
                let id = ContentId::new(name);
                if self.content_exists(&id).await? {
                    ids.push(id);
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for FileContentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileContentStorage")
            .field("root", &self.root)
            .finish()
    }
}

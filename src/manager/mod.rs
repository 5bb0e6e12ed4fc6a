//! Content manager: the single entry point callers use for content objects.
//!
//! Wraps a [`ContentStorage`] backend. Most operations forward straight to
//! the backend; on top of that the manager decodes the canonical documents
//! and imports whole packages atomically (see [`import`]).

pub mod import;
pub mod package;

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use crate::config::paths::{CONTENT_FILE, METADATA_FILE};
use crate::config::ImportSettings;
use crate::domain::{ContentId, ContentParameters, Metadata, Permission, User};
use crate::error::{ContentError, Result};
use crate::storage::{ContentStorage, ContentStream};

pub use package::{Package, PackageFile};

/// Orchestrates all reads and writes of content objects
#[derive(Clone)]
pub struct ContentManager {
    /// Persistence backend
    storage: Arc<dyn ContentStorage>,

    /// Package import settings
    settings: ImportSettings,
}

impl ContentManager {
    /// Create a manager with default import settings
    pub fn new(storage: Arc<dyn ContentStorage>) -> Self {
        Self::with_settings(storage, ImportSettings::default())
    }

    /// Create a manager with explicit import settings
    pub fn with_settings(storage: Arc<dyn ContentStorage>, settings: ImportSettings) -> Self {
        Self { storage, settings }
    }

    /// The backend this manager writes to
    pub fn storage(&self) -> &Arc<dyn ContentStorage> {
        &self.storage
    }

    /// Import settings in effect
    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub async fn add_content_file(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        stream: ContentStream,
        user: Option<&User>,
    ) -> Result<()> {
        debug!(%content_id, relative_path, "add_content_file");
        self.storage
            .add_content_file(content_id, relative_path, stream, user)
            .await
    }

    pub async fn content_exists(&self, content_id: &ContentId) -> Result<bool> {
        debug!(%content_id, "content_exists");
        self.storage.content_exists(content_id).await
    }

    pub async fn create_content(
        &self,
        metadata: &Metadata,
        parameters: &ContentParameters,
        user: &User,
        content_id: Option<ContentId>,
    ) -> Result<ContentId> {
        debug!(content_id = ?content_id, user = %user.id, "create_content");
        self.storage
            .create_content(metadata, parameters, user, content_id)
            .await
    }

    pub async fn create_content_id(&self) -> Result<ContentId> {
        debug!("create_content_id");
        self.storage.create_content_id().await
    }

    pub async fn delete_content(&self, content_id: &ContentId) -> Result<()> {
        debug!(%content_id, "delete_content");
        self.storage.delete_content(content_id).await
    }

    pub async fn get_content_files(&self, content_id: &ContentId, user: &User) -> Result<Vec<String>> {
        debug!(%content_id, user = %user.id, "get_content_files");
        self.storage.get_content_files(content_id, user).await
    }

    pub async fn get_content_file_stream(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        user: &User,
    ) -> Result<ContentStream> {
        debug!(%content_id, relative_path, user = %user.id, "get_content_file_stream");
        self.storage
            .get_content_file_stream(content_id, relative_path, user)
            .await
    }

    pub async fn get_user_permissions(
        &self,
        content_id: &ContentId,
        user: &User,
    ) -> Result<HashSet<Permission>> {
        debug!(%content_id, user = %user.id, "get_user_permissions");
        self.storage.get_user_permissions(content_id, user).await
    }

    pub async fn list_content(&self) -> Result<Vec<ContentId>> {
        debug!("list_content");
        self.storage.list_content().await
    }

    /// Load the content parameters (`content.json`) of a content object
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn load_content(&self, content_id: &ContentId, user: &User) -> Result<ContentParameters> {
        self.load_document(content_id, CONTENT_FILE, user).await
    }

    /// Load the metadata (`h5p.json`) of a content object
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn load_h5p_json(&self, content_id: &ContentId, user: &User) -> Result<Metadata> {
        self.load_document(content_id, METADATA_FILE, user).await
    }

    async fn load_document<T: DeserializeOwned>(
        &self,
        content_id: &ContentId,
        document: &str,
        user: &User,
    ) -> Result<T> {
        let mut stream = self
            .storage
            .get_content_file_stream(content_id, document, user)
            .await?;

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await?;

        serde_json::from_slice(&bytes)
            .map_err(|e| ContentError::decode(format!("{} of content {}", document, content_id), e))
    }
}

impl std::fmt::Debug for ContentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

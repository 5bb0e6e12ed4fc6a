//! In-memory content storage.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{require_permission, validate_relative_path, ContentStorage, ContentStream};
use crate::config::paths::{is_reserved, CONTENT_FILE, METADATA_FILE};
use crate::domain::{ContentId, ContentParameters, Metadata, Permission, User};
use crate::error::{ContentError, Result};

/// Files of one content object, keyed by relative path.
/// The canonical documents are stored as serialized JSON under their
/// reserved paths.
type ContentRecord = HashMap<String, Vec<u8>>;

#[derive(Default)]
struct State {
    contents: HashMap<ContentId, ContentRecord>,
    /// Ids handed out by `create_content_id`, committed or not
    allocated: HashSet<ContentId>,
}

struct Grants {
    default: HashSet<Permission>,
    by_user: HashMap<String, HashSet<Permission>>,
    by_content: HashMap<(ContentId, String), HashSet<Permission>>,
}

impl Grants {
    /// Per-content grants win over per-user grants, which win over the default
    fn resolve(&self, content_id: &ContentId, user: &User) -> HashSet<Permission> {
        self.by_content
            .get(&(content_id.clone(), user.id.clone()))
            .or_else(|| self.by_user.get(&user.id))
            .unwrap_or(&self.default)
            .clone()
    }
}

/// `HashMap`-based content storage.
///
/// Intended for tests and embedding. Every user holds every permission
/// unless narrowed with [`grant_user`](Self::grant_user) or
/// [`grant_content`](Self::grant_content).
pub struct InMemoryContentStorage {
    state: RwLock<State>,
    grants: RwLock<Grants>,
}

impl InMemoryContentStorage {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            grants: RwLock::new(Grants {
                default: Permission::all(),
                by_user: HashMap::new(),
                by_content: HashMap::new(),
            }),
        }
    }

    /// Replace the permissions granted to users without a specific grant
    pub fn with_default_permissions(mut self, permissions: HashSet<Permission>) -> Self {
        self.grants.get_mut().default = permissions;
        self
    }

    /// Set the permissions of a user on every content object
    pub async fn grant_user(&self, user_id: impl Into<String>, permissions: HashSet<Permission>) {
        self.grants
            .write()
            .await
            .by_user
            .insert(user_id.into(), permissions);
    }

    /// Set the permissions of a user on one content object
    pub async fn grant_content(
        &self,
        content_id: &ContentId,
        user_id: impl Into<String>,
        permissions: HashSet<Permission>,
    ) {
        self.grants
            .write()
            .await
            .by_content
            .insert((content_id.clone(), user_id.into()), permissions);
    }

    /// Number of committed content objects
    pub async fn len(&self) -> usize {
        self.state.read().await.contents.len()
    }

    /// Returns `true` if no content has been committed
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.contents.is_empty()
    }

    async fn permissions(&self, content_id: &ContentId, user: &User) -> HashSet<Permission> {
        self.grants.read().await.resolve(content_id, user)
    }
}

impl Default for InMemoryContentStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize_document<T: serde::Serialize>(name: &str, document: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(document)
        .map_err(|e| ContentError::Storage(format!("Failed to serialize {}: {}", name, e)))
}

#[async_trait]
impl ContentStorage for InMemoryContentStorage {
    async fn create_content_id(&self) -> Result<ContentId> {
        let mut state = self.state.write().await;
        loop {
            let id = ContentId::new(Uuid::new_v4().simple().to_string());
            if !state.contents.contains_key(&id) && state.allocated.insert(id.clone()) {
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
        // Serialize before taking the lock so a failure leaves nothing behind
        let metadata_bytes = serialize_document(METADATA_FILE, metadata)?;
        let parameters_bytes = serialize_document(CONTENT_FILE, parameters)?;

        let id = match content_id {
            Some(id) => id,
            None => self.create_content_id().await?,
        };

        let mut state = self.state.write().await;
        state.allocated.insert(id.clone());
        let record = state.contents.entry(id.clone()).or_default();
        record.insert(METADATA_FILE.to_string(), metadata_bytes);
        record.insert(CONTENT_FILE.to_string(), parameters_bytes);

        debug!(content_id = %id, "Committed content");
        Ok(id)
    }

    async fn add_content_file(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        mut stream: ContentStream,
        user: Option<&User>,
    ) -> Result<()> {
        let path = validate_relative_path(relative_path)?;

        if !self.content_exists(content_id).await? {
            return Err(ContentError::ContentNotFound(content_id.clone()));
        }
        if let Some(user) = user {
            let granted = self.permissions(content_id, user).await;
            require_permission(&granted, Permission::Edit, content_id, user)?;
        }

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await?;

        // The object may have been deleted while the stream was drained
        let mut state = self.state.write().await;
        let record = state
            .contents
            .get_mut(content_id)
            .ok_or_else(|| ContentError::ContentNotFound(content_id.clone()))?;
        record.insert(path, bytes);
        Ok(())
    }

    async fn delete_content(&self, content_id: &ContentId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.contents.remove(content_id).is_some() {
            debug!(%content_id, "Deleted content");
        }
        Ok(())
    }

    async fn content_exists(&self, content_id: &ContentId) -> Result<bool> {
        Ok(self.state.read().await.contents.contains_key(content_id))
    }

    async fn get_content_file_stream(
        &self,
        content_id: &ContentId,
        relative_path: &str,
        user: &User,
    ) -> Result<ContentStream> {
        let path = validate_relative_path(relative_path)?;

        if !self.content_exists(content_id).await? {
            return Err(ContentError::ContentNotFound(content_id.clone()));
        }
        let granted = self.permissions(content_id, user).await;
        require_permission(&granted, Permission::View, content_id, user)?;

        let state = self.state.read().await;
        let bytes = state
            .contents
            .get(content_id)
            .ok_or_else(|| ContentError::ContentNotFound(content_id.clone()))?
            .get(&path)
            .cloned()
            .ok_or_else(|| ContentError::FileNotFound {
                content_id: content_id.clone(),
                path,
            })?;

        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn get_content_files(&self, content_id: &ContentId, user: &User) -> Result<Vec<String>> {
        if !self.content_exists(content_id).await? {
            return Err(ContentError::ContentNotFound(content_id.clone()));
        }
        let granted = self.permissions(content_id, user).await;
        require_permission(&granted, Permission::View, content_id, user)?;

        let state = self.state.read().await;
        let files: Vec<String> = state
            .contents
            .get(content_id)
            .map(|record| {
                record
                    .keys()
                    .filter(|path| !is_reserved(path))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(files)
    }

    async fn get_user_permissions(
        &self,
        content_id: &ContentId,
        user: &User,
    ) -> Result<HashSet<Permission>> {
        if !self.content_exists(content_id).await? {
            return Err(ContentError::ContentNotFound(content_id.clone()));
        }
        Ok(self.permissions(content_id, user).await)
    }

    async fn list_content(&self) -> Result<Vec<ContentId>> {
        let state = self.state.read().await;
        let mut ids: Vec<ContentId> = state.contents.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryContentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStorage").finish_non_exhaustive()
    }
}

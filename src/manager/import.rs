//! Atomic package import.
//!
//! 1. Decode both documents and enumerate auxiliary files (nothing written)
//! 2. Commit the object with `create_content`
//! 3. Copy every auxiliary file concurrently and wait for all of them
//! 4. If any copy failed, delete the object and report the failure of the
//!    first file in package order
//!
//! Callers therefore see either the complete object or no object at all.

use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio::fs::File;
use tracing::{error, info, instrument, warn};

use super::package::{Package, PackageFile};
use super::ContentManager;
use crate::domain::{ContentId, User};
use crate::error::Result;

impl ContentManager {
    /// Import the package staged at `package_directory` as one content object.
    ///
    /// `content_id` is passed through to `create_content`; when `None` the
    /// backend allocates a fresh id. A failed copy deletes the object again,
    /// including an object that already existed under a supplied id.
    #[instrument(skip(self, package_directory, user), fields(package = %package_directory.display(), user = %user.id))]
    pub async fn copy_content_from_directory(
        &self,
        package_directory: &Path,
        user: &User,
        content_id: Option<ContentId>,
    ) -> Result<ContentId> {
        let package = Package::open(package_directory, &self.settings).await?;
        let bytes = package.files_size().await?;
        info!(files = package.files.len(), bytes, "Package decoded");

        let new_id = self
            .storage
            .create_content(&package.metadata, &package.parameters, user, content_id)
            .await?;
        info!(content_id = %new_id, "Content committed, copying files");

        if let Err(err) = self.copy_package_files(&new_id, &package.files, user).await {
            warn!(content_id = %new_id, error = %err, "File copy failed, rolling back import");
            if let Err(rollback) = self.storage.delete_content(&new_id).await {
                error!(content_id = %new_id, error = %rollback, "Rollback failed");
            }
            return Err(err);
        }

        info!(content_id = %new_id, "Package imported");
        Ok(new_id)
    }

    /// Copy all files and settle every copy before returning
    async fn copy_package_files(
        &self,
        content_id: &ContentId,
        files: &[PackageFile],
        user: &User,
    ) -> Result<()> {
        let limit = self.settings.copy_limit(files.len());

        let outcomes: Vec<(usize, Result<()>)> = stream::iter(files.iter().enumerate())
            .map(|(index, file)| async move { (index, self.copy_file(content_id, file, user).await) })
            .buffer_unordered(limit)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|(_, outcome)| outcome.is_err()).count();
        if failed > 0 {
            warn!(%content_id, failed, total = files.len(), "Some files failed to copy");
        }

        first_failure(outcomes)
    }

    async fn copy_file(&self, content_id: &ContentId, file: &PackageFile, user: &User) -> Result<()> {
        let source = File::open(&file.source).await?;
        self.storage
            .add_content_file(content_id, &file.relative_path, Box::new(source), Some(user))
            .await
    }
}

/// The error of the lowest-indexed failed copy, independent of completion order
fn first_failure(outcomes: Vec<(usize, Result<()>)>) -> Result<()> {
    outcomes
        .into_iter()
        .filter_map(|(index, outcome)| outcome.err().map(|err| (index, err)))
        .min_by_key(|(index, _)| *index)
        .map_or(Ok(()), |(_, err)| Err(err))
}

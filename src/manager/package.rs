//! Staged content packages.
//!
//! A package is a read-only directory with `h5p.json` at its root and a
//! `content/` subdirectory holding `content.json` plus any number of
//! auxiliary files.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use walkdir::WalkDir;

use crate::config::paths::{self, is_reserved, CONTENT_FILE};
use crate::config::ImportSettings;
use crate::domain::{ContentParameters, Metadata};
use crate::error::{ContentError, Result};

/// Auxiliary file of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    /// Absolute location in the staging directory
    pub source: PathBuf,

    /// Path relative to `content/`, `/`-separated; used as the storage path
    pub relative_path: String,
}

/// A decoded package, ready to be committed
#[derive(Debug, Clone)]
pub struct Package {
    /// Package root directory
    pub root: PathBuf,

    /// Decoded `h5p.json`
    pub metadata: Metadata,

    /// Decoded `content/content.json`
    pub parameters: ContentParameters,

    /// Auxiliary files, sorted by relative path
    pub files: Vec<PackageFile>,
}

impl Package {
    /// Read both documents and enumerate the auxiliary files of `root`.
    ///
    /// Nothing is written anywhere; any error here means the package cannot
    /// be imported.
    pub async fn open(root: &Path, settings: &ImportSettings) -> Result<Self> {
        let metadata = read_document(&paths::package_metadata(root)).await?;
        let parameters = read_document(&paths::package_parameters(root)).await?;

        let content_dir = paths::package_content_dir(root);
        let settings = settings.clone();
        let files =
            tokio::task::spawn_blocking(move || scan_content_dir(&content_dir, &settings)).await??;

        Ok(Self {
            root: root.to_path_buf(),
            metadata,
            parameters,
            files,
        })
    }

    /// Total size of the auxiliary files in bytes
    pub async fn files_size(&self) -> Result<u64> {
        let mut total = 0;
        for file in &self.files {
            total += fs::metadata(&file.source).await?.len();
        }
        Ok(total)
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| ContentError::decode(path.display().to_string(), e))
}

/// Every file below `content_dir` except `content.json` and ignored files
fn scan_content_dir(content_dir: &Path, settings: &ImportSettings) -> Result<Vec<PackageFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(content_dir).min_depth(1).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(content_dir)
            .map_err(|e| ContentError::InvalidPackage(e.to_string()))?;
        let relative_path = relative
            .components()
            .map(|c| {
                c.as_os_str().to_str().map(str::to_string).ok_or_else(|| {
                    ContentError::InvalidPackage(format!(
                        "Non UTF-8 file name: {}",
                        relative.display()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?
            .join("/");

        if relative_path == CONTENT_FILE || settings.is_ignored(&relative_path) {
            continue;
        }
        if is_reserved(&relative_path) {
            return Err(ContentError::InvalidPackage(format!(
                "{} collides with a reserved document name",
                relative_path
            )));
        }

        files.push(PackageFile {
            source: entry.into_path(),
            relative_path,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage(files: &[(&str, &[u8])]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (path, bytes) in files {
            let full = temp.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, bytes).unwrap();
        }
        temp
    }

    #[tokio::test]
    async fn test_open_separates_documents_from_files() {
        let temp = stage(&[
            ("h5p.json", br#"{"title":"Demo","mainLibrary":"H5P.Image"}"#),
            ("content/content.json", b"{}"),
            ("content/images/b.png", b"12345678"),
            ("content/images/a.png", b"1234"),
            ("content/audio/nested/clip.mp3", b"mp3"),
        ]);

        let package = Package::open(temp.path(), &ImportSettings::default())
            .await
            .unwrap();

        assert_eq!(package.metadata.title(), Some("Demo"));
        let paths: Vec<&str> = package.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["audio/nested/clip.mp3", "images/a.png", "images/b.png"]);
        assert_eq!(package.files_size().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_open_without_auxiliary_files() {
        let temp = stage(&[("h5p.json", b"{}"), ("content/content.json", b"{}")]);

        let package = Package::open(temp.path(), &ImportSettings::default())
            .await
            .unwrap();
        assert!(package.files.is_empty());
    }

    #[tokio::test]
    async fn test_nested_content_json_is_an_auxiliary_file() {
        let temp = stage(&[
            ("h5p.json", b"{}"),
            ("content/content.json", b"{}"),
            ("content/sub/content.json", b"[]"),
        ]);

        let package = Package::open(temp.path(), &ImportSettings::default())
            .await
            .unwrap();
        assert_eq!(package.files.len(), 1);
        assert_eq!(package.files[0].relative_path, "sub/content.json");
    }

    #[tokio::test]
    async fn test_open_applies_ignore_patterns() {
        let temp = stage(&[
            ("h5p.json", b"{}"),
            ("content/content.json", b"{}"),
            ("content/images/.DS_Store", b"junk"),
            ("content/images/a.png", b"1234"),
        ]);
        let settings = ImportSettings {
            max_concurrent_copies: None,
            ignore_patterns: vec!["**/.DS_Store".to_string()],
        };

        let package = Package::open(temp.path(), &settings).await.unwrap();
        assert_eq!(package.files.len(), 1);
        assert_eq!(package.files[0].relative_path, "images/a.png");
    }

    #[tokio::test]
    async fn test_open_rejects_reserved_collision() {
        let temp = stage(&[
            ("h5p.json", b"{}"),
            ("content/content.json", b"{}"),
            ("content/h5p.json", b"{}"),
        ]);

        let err = Package::open(temp.path(), &ImportSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidPackage(_)));
    }

    #[tokio::test]
    async fn test_open_reports_decode_errors() {
        let temp = stage(&[("h5p.json", b"{\"title\": "), ("content/content.json", b"{}")]);

        let err = Package::open(temp.path(), &ImportSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_open_missing_metadata_is_io_error() {
        let temp = stage(&[("content/content.json", b"{}")]);

        let err = Package::open(temp.path(), &ImportSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Io(_)));
    }
}

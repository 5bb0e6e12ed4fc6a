//! Canonical names for content packages and stored content objects.
//!
//! Single source of truth - import this instead of hardcoding file names.
//!
//! ## Package layout
//!
//! ```text
//! <package>/
//! ├── h5p.json              # Metadata
//! └── content/
//!     ├── content.json      # Content parameters
//!     └── images/a.png      # Auxiliary files, stored as "images/a.png"
//! ```

use std::path::{Path, PathBuf};

/// Metadata document name, at the package root and in storage
pub const METADATA_FILE: &str = "h5p.json";

/// Content parameters document name, inside `content/` and in storage
pub const CONTENT_FILE: &str = "content.json";

/// Package subdirectory holding content parameters and auxiliary files
pub const CONTENT_DIR: &str = "content";

/// Storage-relative paths reserved for the canonical documents
pub const RESERVED_PATHS: [&str; 2] = [METADATA_FILE, CONTENT_FILE];

/// Whether a storage-relative path names a canonical document
pub fn is_reserved(relative_path: &str) -> bool {
    RESERVED_PATHS.contains(&relative_path)
}

/// `<package>/h5p.json`
pub fn package_metadata(package: &Path) -> PathBuf {
    package.join(METADATA_FILE)
}

/// `<package>/content`
pub fn package_content_dir(package: &Path) -> PathBuf {
    package.join(CONTENT_DIR)
}

/// `<package>/content/content.json`
pub fn package_parameters(package: &Path) -> PathBuf {
    package_content_dir(package).join(CONTENT_FILE)
}

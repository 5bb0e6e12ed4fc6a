//! h5p-content - Storage and package import for H5P content objects
//!
//! A content object is a metadata document (`h5p.json`), a content
//! parameters document (`content.json`) and any number of auxiliary files.
//!
//! # Architecture
//!
//! ```text
//! caller → ContentManager → ContentStorage → backend
//! ```
//!
//! - Backends implement the [`ContentStorage`] contract and own
//!   persistence, locking and permission evaluation
//! - [`ContentManager`] is the single entry point: it forwards to the
//!   backend, decodes the canonical documents and imports staged packages
//!   all-or-nothing
//!
//! # Modules
//!
//! - `config`: Path and import configuration, package layout names
//! - `domain`: Data structures (ContentId, Metadata, User, Permission)
//! - `error`: The `ContentError` taxonomy
//! - `manager`: Content manager and package import
//! - `storage`: Storage contract plus in-memory and filesystem backends
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import a staged package
//! h5p-content import ./staging/quiz
//!
//! # Inspect it
//! h5p-content show <content-id>
//! h5p-content files <content-id>
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod manager;
pub mod storage;

// Re-export main types at crate root for convenience
pub use config::ImportSettings;
pub use domain::{ContentId, ContentParameters, Metadata, Permission, User};
pub use error::{ContentError, Result};
pub use manager::{ContentManager, Package, PackageFile};
pub use storage::{ContentStorage, ContentStream, FileContentStorage, InMemoryContentStorage};

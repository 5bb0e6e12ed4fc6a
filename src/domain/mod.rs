//! Domain types for content storage.
//!
//! - Content: identifiers and the two canonical documents
//! - User: caller identity and permissions

pub mod content;
pub mod user;

// Re-export commonly used types
pub use content::{ContentId, ContentParameters, Metadata};
pub use user::{Permission, User};

//! Caller identity and the permissions a backend can grant it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Identity of the caller, as produced by the host application's auth layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier
    pub id: String,

    /// Display name
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Capability on a content object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read the content and its files
    View,

    /// Modify the content or add files
    Edit,

    /// Remove the content
    Delete,

    /// Download the packaged content
    Download,

    /// Embed the content in another page
    Embed,

    /// See the content in listings
    List,
}

impl Permission {
    /// Every permission
    pub fn all() -> HashSet<Permission> {
        [
            Permission::View,
            Permission::Edit,
            Permission::Delete,
            Permission::Download,
            Permission::Embed,
            Permission::List,
        ]
        .into_iter()
        .collect()
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::View => write!(f, "view"),
            Permission::Edit => write!(f, "edit"),
            Permission::Delete => write!(f, "delete"),
            Permission::Download => write!(f, "download"),
            Permission::Embed => write!(f, "embed"),
            Permission::List => write!(f, "list"),
        }
    }
}

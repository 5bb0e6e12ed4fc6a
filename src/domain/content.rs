//! Content identifiers and the two canonical documents of a content object.
//!
//! Both documents are open JSON records: content types are free to add any
//! fields they like, so only the handful of metadata fields this crate reads
//! get typed accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend-assigned content identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Package descriptor (`h5p.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Create metadata from a JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Create metadata carrying only a title
    pub fn with_title(title: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(title.into()));
        Self(fields)
    }

    /// Human-readable title
    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    /// Machine name of the library that renders this content
    pub fn main_library(&self) -> Option<&str> {
        self.str_field("mainLibrary")
    }

    /// Content language code
    pub fn language(&self) -> Option<&str> {
        self.str_field("language")
    }

    /// License identifier
    pub fn license(&self) -> Option<&str> {
        self.str_field("license")
    }

    /// Supported embed types ("div", "iframe")
    pub fn embed_types(&self) -> Vec<&str> {
        self.0
            .get("embedTypes")
            .and_then(Value::as_array)
            .map(|types| types.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Raw field lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields, in document order
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Content-type payload (`content.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentParameters(Value);

impl ContentParameters {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for ContentParameters {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

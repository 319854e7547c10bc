//! Entities and their reserved metadata block.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the identifier field.
pub const ID_FIELD: &str = "_id";

/// Name of the reserved metadata block.
pub const METADATA_FIELD: &str = "_kmd";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Reserved metadata carried by every entity.
///
/// Timestamps are server-issued strings and are treated as opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Last-modified time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lmt: Option<String>,

    /// Entity creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ect: Option<String>,

    /// Session-scoped authorization token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authtoken: Option<String>,

    /// The `_id` was generated on-device and never accepted by the server.
    #[serde(default, skip_serializing_if = "is_false")]
    pub local: bool,

    /// Any other metadata the server attaches.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A document exchanged with the backend.
///
/// An entity is an open map of caller fields plus two reserved members: the
/// `_id` identifier (absent until the entity is persisted) and the `_kmd`
/// metadata block.
///
/// # Example
///
/// ```rust
/// use docsync_protocol::Entity;
/// use serde_json::json;
///
/// let book = Entity::new().with_field("title", json!("Dune"));
/// assert!(book.id().is_none());
/// assert_eq!(book.get("title"), Some(&json!("Dune")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Reserved metadata block.
    #[serde(rename = "_kmd", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Caller-defined fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Creates an empty entity with no id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty entity with the given id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Sets a caller field, builder style.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Returns the entity id, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns a caller field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a caller field.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Returns true if the id was generated on-device and never accepted by
    /// the server.
    pub fn is_local(&self) -> bool {
        self.metadata.as_ref().is_some_and(|kmd| kmd.local)
    }

    /// Marks the entity as carrying a locally generated id.
    pub fn mark_local(&mut self) {
        self.metadata.get_or_insert_with(Metadata::default).local = true;
    }

    /// Clears the local flag, dropping an emptied metadata block.
    pub fn clear_local(&mut self) {
        if let Some(kmd) = self.metadata.as_mut() {
            kmd.local = false;
            if *kmd == Metadata::default() {
                self.metadata = None;
            }
        }
    }

    /// Converts the entity to a JSON document.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Builds an entity from a JSON document.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

//! Storage namespaces: a collection name plus an optional isolation tag.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Collection name of the shared sync queue.
pub const SYNC_QUEUE_COLLECTION: &str = "kinvey_sync";

/// Collection name of the delta-fetch bookkeeping store.
pub const QUERY_CACHE_COLLECTION: &str = "_QueryCache";

/// A (collection, tag) pair identifying one local dataset.
///
/// The storage key is `collection` when no tag is given, else
/// `collection.tag`.
///
/// # Example
///
/// ```rust
/// use docsync_core::Namespace;
///
/// let ns = Namespace::new("books", Some("alice")).unwrap();
/// assert_eq!(ns.key(), "books.alice");
/// assert!(Namespace::new("books", Some("not valid!")).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    collection: String,
    tag: Option<String>,
}

impl Namespace {
    /// Creates a namespace.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the collection name is empty or the tag
    /// does not match `^[A-Za-z0-9-]+$`.
    pub fn new(collection: impl Into<String>, tag: Option<&str>) -> CoreResult<Self> {
        let collection = collection.into();
        if collection.is_empty() {
            return Err(CoreError::validation("collection name must not be empty"));
        }
        if let Some(tag) = tag {
            validate_tag(tag)?;
        }
        Ok(Self {
            collection,
            tag: tag.map(str::to_owned),
        })
    }

    /// Namespace of the sync queue for `tag`.
    pub fn sync_queue(tag: Option<&str>) -> CoreResult<Self> {
        Self::new(SYNC_QUEUE_COLLECTION, tag)
    }

    /// Namespace of the query cache for `tag`.
    pub fn query_cache(tag: Option<&str>) -> CoreResult<Self> {
        Self::new(QUERY_CACHE_COLLECTION, tag)
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the storage key.
    pub fn key(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}.{tag}", self.collection),
            None => self.collection.clone(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Checks a tag against `^[A-Za-z0-9-]+$`.
///
/// # Errors
///
/// Returns a validation error naming the tag.
pub fn validate_tag(tag: &str) -> CoreResult<()> {
    if !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "tag {tag:?} must contain only letters, digits and dashes"
        )))
    }
}

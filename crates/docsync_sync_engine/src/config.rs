//! Configuration for the sync engine and data stores.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// Number of queue entries pushed concurrently per batch.
pub const DEFAULT_PUSH_BATCH_SIZE: usize = 100;

/// Window size of one auto-pagination page.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Client-wide sync configuration.
///
/// Deserializes with defaults for every missing field, so a config file may
/// set only what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Queue entries pushed concurrently per batch.
    pub push_batch_size: usize,
    /// Documents requested per page when auto-pagination is on.
    pub page_size: usize,
    /// Whether pulls use delta-set fetches by default.
    pub use_delta_set: bool,
    /// Whether pulls use auto-pagination by default.
    pub auto_pagination: bool,
    /// Default tag isolating local datasets.
    pub tag: Option<String>,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the auto-pagination page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Enables or disables delta-set fetches by default.
    pub fn with_delta_set(mut self, enabled: bool) -> Self {
        self.use_delta_set = enabled;
        self
    }

    /// Enables or disables auto-pagination by default.
    pub fn with_auto_pagination(mut self, enabled: bool) -> Self {
        self.auto_pagination = enabled;
        self
    }

    /// Sets the default tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Checks sizes and the tag format.
    pub fn validate(&self) -> SyncResult<()> {
        if self.push_batch_size == 0 {
            return Err(SyncError::validation("push_batch_size must be positive"));
        }
        if self.page_size == 0 {
            return Err(SyncError::validation("page_size must be positive"));
        }
        if let Some(tag) = &self.tag {
            docsync_core::validate_tag(tag)?;
        }
        Ok(())
    }

    /// Default pull options derived from this configuration.
    pub fn pull_options(&self) -> PullOptions {
        PullOptions {
            use_delta_set: self.use_delta_set,
            auto_pagination: self.auto_pagination.then_some(self.page_size),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            use_delta_set: false,
            auto_pagination: false,
            tag: None,
        }
    }
}

/// Options of one pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Try a delta-set fetch first when the query is unbounded.
    pub use_delta_set: bool,
    /// Fetch in pages of this size.
    pub auto_pagination: Option<usize>,
}

impl PullOptions {
    /// Full fetch, no delta set, no pagination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the delta-set fetch.
    pub fn with_delta_set(mut self, enabled: bool) -> Self {
        self.use_delta_set = enabled;
        self
    }

    /// Enables auto-pagination with the given page size.
    pub fn with_auto_pagination(mut self, page_size: usize) -> Self {
        self.auto_pagination = Some(page_size);
        self
    }
}

/// Per-store overrides of the client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Tag isolating this store's local dataset.
    pub tag: Option<String>,
    /// Overrides [`SyncConfig::use_delta_set`].
    pub use_delta_set: Option<bool>,
    /// Overrides [`SyncConfig::auto_pagination`].
    pub auto_pagination: Option<bool>,
}

impl StoreOptions {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Overrides the delta-set default.
    pub fn with_delta_set(mut self, enabled: bool) -> Self {
        self.use_delta_set = Some(enabled);
        self
    }

    /// Overrides the auto-pagination default.
    pub fn with_auto_pagination(mut self, enabled: bool) -> Self {
        self.auto_pagination = Some(enabled);
        self
    }

    /// Resolves the effective tag against `config`.
    pub(crate) fn tag<'a>(&'a self, config: &'a SyncConfig) -> Option<&'a str> {
        self.tag.as_deref().or(config.tag.as_deref())
    }

    /// Resolves the effective pull options against `config`.
    pub(crate) fn pull_options(&self, config: &SyncConfig) -> PullOptions {
        let paginate = self.auto_pagination.unwrap_or(config.auto_pagination);
        PullOptions {
            use_delta_set: self.use_delta_set.unwrap_or(config.use_delta_set),
            auto_pagination: paginate.then_some(config.page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_push_batch_size(25)
            .with_page_size(500)
            .with_delta_set(true)
            .with_tag("device-1");

        assert_eq!(config.push_batch_size, 25);
        assert_eq!(config.page_size, 500);
        assert!(config.use_delta_set);
        assert_eq!(config.tag.as_deref(), Some("device-1"));
        config.validate().unwrap();
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.push_batch_size, 100);
        assert_eq!(config.page_size, 10_000);
        assert_eq!(config.pull_options(), PullOptions::new());
    }

    #[test]
    fn deserialize_partial() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "auto_pagination": true, "page_size": 50 }"#).unwrap();
        assert_eq!(config.push_batch_size, 100);
        assert_eq!(config.pull_options().auto_pagination, Some(50));
    }

    #[test]
    fn validation() {
        assert!(SyncConfig::new().with_push_batch_size(0).validate().is_err());
        assert!(SyncConfig::new().with_page_size(0).validate().is_err());
        let err = SyncConfig::new().with_tag("bad tag").validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn store_options_override_config() {
        let config = SyncConfig::new().with_delta_set(true).with_tag("a");
        let options = StoreOptions::new()
            .with_delta_set(false)
            .with_auto_pagination(true);

        assert_eq!(options.tag(&config), Some("a"));
        assert_eq!(
            options.pull_options(&config),
            PullOptions::new().with_auto_pagination(10_000)
        );
        assert_eq!(StoreOptions::new().with_tag("b").tag(&config), Some("b"));
    }
}

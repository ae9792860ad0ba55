use std::sync::Arc;

use async_trait::async_trait;

use crate::asset::Asset;
use crate::content_type::ContentTypeDef;
use crate::error::StoreError;
use crate::record::{Entry, EntryPage, EntryQuery, Fields, Page};

/// The write target of every cmsload job: one environment of a headless CMS.
///
/// ## Versioning
///
/// Every entry carries `sys.version`. `update_entry` and `publish_entry`
/// send the version the caller last read; if the store has moved on since,
/// the call fails with `StoreError::VersionMismatch` and nothing is written.
/// Both return the entry as stored after the write, so callers chain further
/// writes on the returned value rather than on their stale copy.
///
/// ## Existence checks
///
/// `get_entry` on an unknown id returns `StoreError::NotFound`. Callers use
/// [`StoreError::is_not_found`] to tell that expected branch apart from
/// transport or permission failures. The same holds for assets.
///
/// ## Assets
///
/// A new asset points at an upload URL. `process_asset` asks the store to
/// fetch it; the store may finish after the call returns, so callers poll
/// `get_asset` until [`Asset::is_processed`] before publishing.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so one handle can be shared by the
/// concurrent record tasks of a batch.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// List one page of entries matching `query`.
    ///
    /// `EntryPage::total` counts all matches, not just this page.
    async fn list_entries(&self, query: &EntryQuery) -> Result<EntryPage, StoreError>;

    /// Create a draft entry with a store-assigned id.
    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Entry, StoreError>;

    /// Create a draft entry with a caller-chosen id.
    ///
    /// Returns `Err(StoreError::AlreadyExists)` if the id is taken.
    async fn create_entry_with_id(
        &self,
        content_type: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Entry, StoreError>;

    /// Read one entry by id.
    async fn get_entry(&self, id: &str) -> Result<Entry, StoreError>;

    /// Replace the fields of `entry`, checked against `entry.sys.version`.
    async fn update_entry(&self, entry: &Entry) -> Result<Entry, StoreError>;

    /// Delete a draft entry. Published entries are rejected with
    /// `StoreError::Validation`.
    async fn delete_entry(&self, id: &str) -> Result<(), StoreError>;

    /// Publish `entry` at its current version.
    async fn publish_entry(&self, entry: &Entry) -> Result<Entry, StoreError>;

    /// List one page of assets matching `query`.
    async fn list_assets(&self, query: &EntryQuery) -> Result<Page<Asset>, StoreError>;

    /// Create a draft asset with a store-assigned id.
    async fn create_asset(&self, fields: Fields) -> Result<Asset, StoreError>;

    /// Create a draft asset with a caller-chosen id.
    ///
    /// Returns `Err(StoreError::AlreadyExists)` if the id is taken.
    async fn create_asset_with_id(&self, id: &str, fields: Fields) -> Result<Asset, StoreError>;

    async fn get_asset(&self, id: &str) -> Result<Asset, StoreError>;

    /// Replace the fields of `asset`, checked against `asset.sys.version`.
    async fn update_asset(&self, asset: &Asset) -> Result<Asset, StoreError>;

    /// Start processing the file of `asset` in `locale`.
    async fn process_asset(&self, asset: &Asset, locale: &str) -> Result<(), StoreError>;

    /// Publish a processed `asset` at its current version.
    async fn publish_asset(&self, asset: &Asset) -> Result<Asset, StoreError>;

    /// Every content type of the environment.
    async fn list_content_types(&self) -> Result<Vec<ContentTypeDef>, StoreError>;
}

#[async_trait]
impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    async fn list_entries(&self, query: &EntryQuery) -> Result<EntryPage, StoreError> {
        (**self).list_entries(query).await
    }

    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Entry, StoreError> {
        (**self).create_entry(content_type, fields).await
    }

    async fn create_entry_with_id(
        &self,
        content_type: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Entry, StoreError> {
        (**self).create_entry_with_id(content_type, id, fields).await
    }

    async fn get_entry(&self, id: &str) -> Result<Entry, StoreError> {
        (**self).get_entry(id).await
    }

    async fn update_entry(&self, entry: &Entry) -> Result<Entry, StoreError> {
        (**self).update_entry(entry).await
    }

    async fn delete_entry(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete_entry(id).await
    }

    async fn publish_entry(&self, entry: &Entry) -> Result<Entry, StoreError> {
        (**self).publish_entry(entry).await
    }

    async fn list_assets(&self, query: &EntryQuery) -> Result<Page<Asset>, StoreError> {
        (**self).list_assets(query).await
    }

    async fn create_asset(&self, fields: Fields) -> Result<Asset, StoreError> {
        (**self).create_asset(fields).await
    }

    async fn create_asset_with_id(&self, id: &str, fields: Fields) -> Result<Asset, StoreError> {
        (**self).create_asset_with_id(id, fields).await
    }

    async fn get_asset(&self, id: &str) -> Result<Asset, StoreError> {
        (**self).get_asset(id).await
    }

    async fn update_asset(&self, asset: &Asset) -> Result<Asset, StoreError> {
        (**self).update_asset(asset).await
    }

    async fn process_asset(&self, asset: &Asset, locale: &str) -> Result<(), StoreError> {
        (**self).process_asset(asset, locale).await
    }

    async fn publish_asset(&self, asset: &Asset) -> Result<Asset, StoreError> {
        (**self).publish_asset(asset).await
    }

    async fn list_content_types(&self) -> Result<Vec<ContentTypeDef>, StoreError> {
        (**self).list_content_types().await
    }
}

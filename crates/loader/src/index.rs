//! Existing-State Index: which natural keys already have entries.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cmsload_storage::{Asset, ContentStore, Entry, EntryQuery, StoreError, DEFAULT_PAGE_SIZE};
use tracing::{debug, info, warn};

use crate::schema::{ContentTypeSchema, SchemaError};

/// How the index reads the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    pub page_size: usize,
    pub locale: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            locale: "en-GB".to_string(),
        }
    }
}

/// Read every entry matching `query`, one `page_size` page at a time.
///
/// Stops at the first page shorter than `page_size`, so a result set that is
/// an exact multiple of the page size costs one extra (empty) request.
pub async fn fetch_all<S>(
    store: &S,
    query: &EntryQuery,
    page_size: usize,
) -> Result<Vec<Entry>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut skip = 0;
    loop {
        let page = store
            .list_entries(&query.clone().page(skip, page_size))
            .await?;
        let fetched = page.items.len();
        items.extend(page.items);
        if fetched < page_size {
            break;
        }
        skip += page_size;
    }
    Ok(items)
}

/// Assets matching `query`, paged like [`fetch_all`].
pub async fn fetch_all_assets<S>(
    store: &S,
    query: &EntryQuery,
    page_size: usize,
) -> Result<Vec<Asset>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut skip = 0;
    loop {
        let page = store
            .list_assets(&query.clone().page(skip, page_size))
            .await?;
        let fetched = page.items.len();
        items.extend(page.items);
        if fetched < page_size {
            break;
        }
        skip += page_size;
    }
    Ok(items)
}

/// Index namespace of assets, keyed by title.
pub const ASSET_KEYS: &str = "Asset";

/// Listing a content type failed while building an [`ExistingIndex`].
#[derive(Debug, thiserror::Error)]
#[error("could not read existing {content_type} entries: {source}")]
pub struct IndexError {
    pub content_type: String,
    #[source]
    pub source: StoreError,
}

/// Point-in-time map of natural key -> entry id, per content type.
///
/// Built once at the start of a run. Entries created during the run are
/// recorded with [`ExistingIndex::record`] so later records see them; writes
/// by anyone else after the build are not reflected.
#[derive(Debug, Default)]
pub struct ExistingIndex {
    keys: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
    anomalies: Vec<SchemaError>,
}

impl ExistingIndex {
    /// An empty index, as if the store held nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Paginate each schema's content type and index its entries.
    ///
    /// Entries whose key field is missing or malformed contribute no key;
    /// they are kept as [`SchemaError`] anomalies instead of failing the build.
    /// Keyed entries lacking a required field are indexed and also recorded
    /// as anomalies.
    pub async fn build<S>(
        store: &S,
        schemas: &[&ContentTypeSchema],
        options: &IndexOptions,
    ) -> Result<Self, IndexError>
    where
        S: ContentStore + ?Sized,
    {
        let mut keys: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut anomalies = Vec::new();

        for schema in schemas {
            let entries = fetch_all(store, &EntryQuery::for_type(schema.id), options.page_size)
                .await
                .map_err(|source| IndexError {
                    content_type: schema.id.to_string(),
                    source,
                })?;
            let by_key = keys.entry(schema.id.to_string()).or_default();
            for entry in &entries {
                match schema.natural_key(entry, &options.locale) {
                    Ok(key) => {
                        if let Err(e) = schema.validate(entry, &options.locale) {
                            debug!("incomplete entry: {}", e);
                            anomalies.push(e);
                        }
                        if let Some(first) = by_key.get(&key) {
                            warn!(
                                "duplicate {} key '{}': keeping {}, ignoring {}",
                                schema.id,
                                key,
                                first,
                                entry.id()
                            );
                            continue;
                        }
                        by_key.insert(key, entry.id().to_string());
                    }
                    Err(e) => {
                        debug!("unindexed entry: {}", e);
                        anomalies.push(e);
                    }
                }
            }
            info!(
                "indexed {} {} entries ({} keys)",
                entries.len(),
                schema.id,
                by_key.len()
            );
        }

        Ok(Self {
            keys: RwLock::new(keys),
            anomalies,
        })
    }

    /// Add every asset under [`ASSET_KEYS`], keyed by its title in the
    /// index locale. Untitled assets are not indexed.
    pub async fn index_assets<S>(&mut self, store: &S, options: &IndexOptions) -> Result<(), IndexError>
    where
        S: ContentStore + ?Sized,
    {
        let assets = fetch_all_assets(store, &EntryQuery::default(), options.page_size)
            .await
            .map_err(|source| IndexError {
                content_type: ASSET_KEYS.to_string(),
                source,
            })?;
        let mut keys = self.write();
        let by_title = keys.entry(ASSET_KEYS.to_string()).or_default();
        for asset in &assets {
            let Some(title) = asset.title(&options.locale) else {
                continue;
            };
            if let Some(first) = by_title.get(title) {
                warn!(
                    "duplicate asset title '{}': keeping {}, ignoring {}",
                    title,
                    first,
                    asset.id()
                );
                continue;
            }
            by_title.insert(title.to_string(), asset.id().to_string());
        }
        info!("indexed {} assets ({} titles)", assets.len(), by_title.len());
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, BTreeMap<String, String>>> {
        self.keys.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, BTreeMap<String, String>>> {
        self.keys.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn contains(&self, content_type: &str, key: &str) -> bool {
        self.read()
            .get(content_type)
            .map(|by_key| by_key.contains_key(key))
            .unwrap_or(false)
    }

    /// Store id of the entry holding `key`, if any.
    pub fn id_of(&self, content_type: &str, key: &str) -> Option<String> {
        self.read()
            .get(content_type)
            .and_then(|by_key| by_key.get(key).cloned())
    }

    /// All keys of `content_type`, sorted.
    pub fn keys(&self, content_type: &str) -> Vec<String> {
        self.read()
            .get(content_type)
            .map(|by_key| by_key.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, content_type: &str) -> usize {
        self.read().get(content_type).map(BTreeMap::len).unwrap_or(0)
    }

    /// Record an entry created during the run. An existing mapping wins.
    pub fn record(&self, content_type: &str, key: &str, id: &str) {
        self.write()
            .entry(content_type.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| id.to_string());
    }

    /// Entries skipped during the build because they did not fit their schema.
    pub fn anomalies(&self) -> &[SchemaError] {
        &self.anomalies
    }
}

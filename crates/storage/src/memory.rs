//! In-process [`ContentStore`] used by tests and dry runs.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use serde_json::Value;

use crate::asset::{Asset, AssetSys, ASSET_FILE_FIELD};
use crate::content_type::ContentTypeDef;
use crate::error::StoreError;
use crate::record::{
    Entry, EntryPage, EntryQuery, EntrySys, Fields, Page, DRAFT_FILTER, MAX_PAGE_SIZE, TAG_FILTER,
};
use crate::traits::ContentStore;

/// Failure injected into a [`MemoryStore`] operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fault {
    CreateType(String),
    CreateWhere {
        content_type: String,
        field: String,
        value: String,
    },
    Get(String),
    Update(String),
    Delete(String),
    List(String),
    CreateAsset,
}

/// Counts of successful writes, for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub publishes: usize,
    /// Asset creates, updates, processing requests and publishes.
    pub asset_writes: usize,
}

#[derive(Default)]
struct MemoryState {
    /// Insertion order is the listing order.
    entries: Vec<Entry>,
    assets: Vec<Asset>,
    content_types: Vec<ContentTypeDef>,
    next_id: u64,
    clock: u64,
    faults: Vec<Fault>,
    writes: WriteCounts,
}

impl MemoryState {
    fn tick(&mut self) -> String {
        self.clock += 1;
        let t = self.clock;
        format!(
            "2026-01-01T{:02}:{:02}:{:02}Z",
            (t / 3600) % 24,
            (t / 60) % 60,
            t % 60
        )
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.sys.id == id)
    }

    fn insert_new(&mut self, content_type: &str, id: String, fields: Fields) -> Entry {
        let now = self.tick();
        let entry = Entry {
            sys: EntrySys {
                id,
                content_type: content_type.to_string(),
                version: 1,
                created_at: now.clone(),
                updated_at: now,
                published_at: None,
                published_version: None,
            },
            fields,
            tags: Vec::new(),
        };
        self.entries.push(entry.clone());
        entry
    }

    fn asset_position(&self, id: &str) -> Option<usize> {
        self.assets.iter().position(|a| a.sys.id == id)
    }

    fn insert_asset(&mut self, id: String, fields: Fields) -> Asset {
        let now = self.tick();
        let asset = Asset {
            sys: AssetSys {
                id,
                version: 1,
                created_at: now.clone(),
                updated_at: now,
                published_at: None,
                published_version: None,
            },
            fields,
            tags: Vec::new(),
        };
        self.assets.push(asset.clone());
        self.writes.asset_writes += 1;
        asset
    }

    /// Position of `asset` if it exists at the version the caller holds.
    fn current_asset(&self, asset: &Asset) -> Result<usize, StoreError> {
        let id = asset.sys.id.clone();
        let pos = self
            .asset_position(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        if self.assets[pos].sys.version != asset.sys.version {
            return Err(StoreError::VersionMismatch {
                id,
                expected: asset.sys.version,
            });
        }
        Ok(pos)
    }

    fn check_create_faults(&self, content_type: &str, fields: &Fields) -> Result<(), StoreError> {
        for fault in &self.faults {
            match fault {
                Fault::CreateType(ct) if ct == content_type => {
                    return Err(StoreError::Backend(format!(
                        "injected failure creating {content_type}"
                    )));
                }
                Fault::CreateWhere {
                    content_type: ct,
                    field,
                    value,
                } if ct == content_type && field_has_value(fields, field, value) => {
                    return Err(StoreError::Backend(format!(
                        "injected failure creating {content_type} with {field}={value}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }
}

fn field_has_value(fields: &Fields, field: &str, value: &str) -> bool {
    fields
        .get(field)
        .map(|locales| locales.values().any(|v| v.as_str() == Some(value)))
        .unwrap_or(false)
}

fn check_filter_key(key: &str) -> Result<(), StoreError> {
    if key == DRAFT_FILTER || key == TAG_FILTER || key == "sys.id" || key.starts_with("fields.") {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("unsupported filter '{key}'")))
    }
}

/// What a listing filter can look at, for entries and assets alike.
struct Filterable<'a> {
    id: &'a str,
    published: bool,
    tags: &'a [String],
    fields: &'a Fields,
}

impl<'a> From<&'a Entry> for Filterable<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            id: &entry.sys.id,
            published: entry.is_published(),
            tags: &entry.tags,
            fields: &entry.fields,
        }
    }
}

impl<'a> From<&'a Asset> for Filterable<'a> {
    fn from(asset: &'a Asset) -> Self {
        Self {
            id: &asset.sys.id,
            published: asset.is_published(),
            tags: &asset.tags,
            fields: &asset.fields,
        }
    }
}

fn matches_filter(item: &Filterable<'_>, key: &str, value: &str) -> Result<bool, StoreError> {
    if key == DRAFT_FILTER {
        return match value {
            "true" => Ok(item.published),
            "false" => Ok(!item.published),
            other => Err(StoreError::Validation(format!(
                "{DRAFT_FILTER} expects true or false, got '{other}'"
            ))),
        };
    }
    if key == TAG_FILTER {
        return Ok(value
            .split(',')
            .map(str::trim)
            .any(|tag| item.tags.iter().any(|t| t == tag)));
    }
    if key == "sys.id" {
        return Ok(item.id == value);
    }
    if let Some(field) = key.strip_prefix("fields.") {
        return Ok(field_has_value(item.fields, field, value));
    }
    Err(StoreError::Validation(format!("unsupported filter '{key}'")))
}

/// Check a listing request and return the items of `pool` it selects.
fn select<'p, T>(pool: &'p [T], query: &EntryQuery) -> Result<Page<T>, StoreError>
where
    T: Clone,
    &'p T: Into<Filterable<'p>>,
{
    if query.limit == 0 || query.limit > MAX_PAGE_SIZE {
        return Err(StoreError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}, got {}",
            query.limit
        )));
    }
    for key in query.filters.keys() {
        check_filter_key(key)?;
    }
    let mut matched = Vec::new();
    for item in pool {
        let view: Filterable<'p> = item.into();
        let mut keep = true;
        for (key, value) in &query.filters {
            if !matches_filter(&view, key, value)? {
                keep = false;
                break;
            }
        }
        if keep {
            matched.push(item);
        }
    }
    let total = matched.len();
    let items = matched
        .into_iter()
        .skip(query.skip)
        .take(query.limit)
        .cloned()
        .collect();
    Ok(Page {
        items,
        total,
        skip: query.skip,
        limit: query.limit,
    })
}

/// A [`ContentStore`] held entirely in memory.
///
/// Ids are `mem-<n>`; timestamps come from a logical clock, one second per
/// write, so later writes always compare greater. Failures can be injected
/// per content type, per field value or per id to exercise error paths.
///
/// Processing an asset is immediate: the file's `upload` becomes a `url`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves the state usable for reads.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert a draft entry directly, bypassing fault injection.
    pub fn seed(&self, content_type: &str, fields: Fields) -> Entry {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        state.insert_new(content_type, id, fields)
    }

    /// Insert a fully formed entry as-is, replacing any entry with its id.
    pub fn insert(&self, entry: Entry) {
        let mut state = self.state();
        match state.position(&entry.sys.id) {
            Some(pos) => state.entries[pos] = entry,
            None => state.entries.push(entry),
        }
    }

    /// Make every `create_entry` of `content_type` fail.
    pub fn fail_create(&self, content_type: &str) {
        self.state()
            .faults
            .push(Fault::CreateType(content_type.to_string()));
    }

    /// Make creation of `content_type` fail when `field` holds `value`.
    pub fn fail_create_where(&self, content_type: &str, field: &str, value: &str) {
        self.state().faults.push(Fault::CreateWhere {
            content_type: content_type.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    /// Make `get_entry(id)` fail with a backend error (not `NotFound`).
    pub fn fail_get(&self, id: &str) {
        self.state().faults.push(Fault::Get(id.to_string()));
    }

    pub fn fail_update(&self, id: &str) {
        self.state().faults.push(Fault::Update(id.to_string()));
    }

    pub fn fail_delete(&self, id: &str) {
        self.state().faults.push(Fault::Delete(id.to_string()));
    }

    /// Make listing `content_type` fail.
    pub fn fail_list(&self, content_type: &str) {
        self.state().faults.push(Fault::List(content_type.to_string()));
    }

    /// Make every asset create fail.
    pub fn fail_create_asset(&self) {
        self.state().faults.push(Fault::CreateAsset);
    }

    /// Insert a fully formed asset as-is, replacing any asset with its id.
    pub fn insert_asset(&self, asset: Asset) {
        let mut state = self.state();
        match state.asset_position(&asset.sys.id) {
            Some(pos) => state.assets[pos] = asset,
            None => state.assets.push(asset),
        }
    }

    /// Add a content type definition, as if created in the editor.
    pub fn define_content_type(&self, def: ContentTypeDef) {
        self.state().content_types.push(def);
    }

    /// All assets, in insertion order.
    pub fn assets(&self) -> Vec<Asset> {
        self.state().assets.clone()
    }

    pub fn asset_snapshot(&self, id: &str) -> Option<Asset> {
        let state = self.state();
        state.asset_position(id).map(|pos| state.assets[pos].clone())
    }

    /// All entries of `content_type`, in insertion order.
    pub fn entries_of(&self, content_type: &str) -> Vec<Entry> {
        self.state()
            .entries
            .iter()
            .filter(|e| e.sys.content_type == content_type)
            .cloned()
            .collect()
    }

    /// Entry by id without going through the async API.
    pub fn snapshot(&self, id: &str) -> Option<Entry> {
        let state = self.state();
        state.position(id).map(|pos| state.entries[pos].clone())
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writes(&self) -> WriteCounts {
        self.state().writes
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_entries(&self, query: &EntryQuery) -> Result<EntryPage, StoreError> {
        let state = self.state();
        match &query.content_type {
            Some(ct) => {
                if state.has_fault(&Fault::List(ct.clone())) {
                    return Err(StoreError::Backend(format!("injected failure listing {ct}")));
                }
                let of_type: Vec<Entry> = state
                    .entries
                    .iter()
                    .filter(|e| &e.sys.content_type == ct)
                    .cloned()
                    .collect();
                select(&of_type, query)
            }
            None => select(&state.entries, query),
        }
    }

    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Entry, StoreError> {
        let mut state = self.state();
        state.check_create_faults(content_type, &fields)?;
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        state.writes.creates += 1;
        Ok(state.insert_new(content_type, id, fields))
    }

    async fn create_entry_with_id(
        &self,
        content_type: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Entry, StoreError> {
        let mut state = self.state();
        if state.position(id).is_some() {
            return Err(StoreError::AlreadyExists { id: id.to_string() });
        }
        state.check_create_faults(content_type, &fields)?;
        state.writes.creates += 1;
        Ok(state.insert_new(content_type, id.to_string(), fields))
    }

    async fn get_entry(&self, id: &str) -> Result<Entry, StoreError> {
        let state = self.state();
        if state.has_fault(&Fault::Get(id.to_string())) {
            return Err(StoreError::Backend(format!("injected failure reading {id}")));
        }
        state
            .position(id)
            .map(|pos| state.entries[pos].clone())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn update_entry(&self, entry: &Entry) -> Result<Entry, StoreError> {
        let mut state = self.state();
        let id = entry.sys.id.clone();
        if state.has_fault(&Fault::Update(id.clone())) {
            return Err(StoreError::Backend(format!("injected failure updating {id}")));
        }
        let pos = state
            .position(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        if state.entries[pos].sys.version != entry.sys.version {
            return Err(StoreError::VersionMismatch {
                id,
                expected: entry.sys.version,
            });
        }
        let now = state.tick();
        let stored = &mut state.entries[pos];
        stored.fields = entry.fields.clone();
        stored.tags = entry.tags.clone();
        stored.sys.version += 1;
        stored.sys.updated_at = now;
        let updated = stored.clone();
        state.writes.updates += 1;
        Ok(updated)
    }

    async fn delete_entry(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.has_fault(&Fault::Delete(id.to_string())) {
            return Err(StoreError::Backend(format!("injected failure deleting {id}")));
        }
        let pos = state
            .position(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        if state.entries[pos].is_published() {
            return Err(StoreError::Validation(format!(
                "cannot delete published entry {id}"
            )));
        }
        state.entries.remove(pos);
        state.writes.deletes += 1;
        Ok(())
    }

    async fn publish_entry(&self, entry: &Entry) -> Result<Entry, StoreError> {
        let mut state = self.state();
        let id = entry.sys.id.clone();
        let pos = state
            .position(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        if state.entries[pos].sys.version != entry.sys.version {
            return Err(StoreError::VersionMismatch {
                id,
                expected: entry.sys.version,
            });
        }
        let now = state.tick();
        let stored = &mut state.entries[pos];
        stored.sys.published_version = Some(stored.sys.version);
        stored.sys.published_at = Some(now.clone());
        stored.sys.updated_at = now;
        stored.sys.version += 1;
        let published = stored.clone();
        state.writes.publishes += 1;
        Ok(published)
    }

    async fn list_assets(&self, query: &EntryQuery) -> Result<Page<Asset>, StoreError> {
        select(&self.state().assets, query)
    }

    async fn create_asset(&self, fields: Fields) -> Result<Asset, StoreError> {
        let mut state = self.state();
        if state.has_fault(&Fault::CreateAsset) {
            return Err(StoreError::Backend("injected failure creating asset".to_string()));
        }
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        Ok(state.insert_asset(id, fields))
    }

    async fn create_asset_with_id(&self, id: &str, fields: Fields) -> Result<Asset, StoreError> {
        let mut state = self.state();
        if state.asset_position(id).is_some() {
            return Err(StoreError::AlreadyExists { id: id.to_string() });
        }
        if state.has_fault(&Fault::CreateAsset) {
            return Err(StoreError::Backend("injected failure creating asset".to_string()));
        }
        Ok(state.insert_asset(id.to_string(), fields))
    }

    async fn get_asset(&self, id: &str) -> Result<Asset, StoreError> {
        let state = self.state();
        if state.has_fault(&Fault::Get(id.to_string())) {
            return Err(StoreError::Backend(format!("injected failure reading {id}")));
        }
        state
            .asset_position(id)
            .map(|pos| state.assets[pos].clone())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn update_asset(&self, asset: &Asset) -> Result<Asset, StoreError> {
        let mut state = self.state();
        let pos = state.current_asset(asset)?;
        let now = state.tick();
        let stored = &mut state.assets[pos];
        stored.fields = asset.fields.clone();
        stored.tags = asset.tags.clone();
        stored.sys.version += 1;
        stored.sys.updated_at = now;
        let updated = stored.clone();
        state.writes.asset_writes += 1;
        Ok(updated)
    }

    async fn process_asset(&self, asset: &Asset, locale: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let pos = state.current_asset(asset)?;
        let id = asset.sys.id.clone();
        let now = state.tick();
        let stored = &mut state.assets[pos];
        let file = stored
            .fields
            .get_mut(ASSET_FILE_FIELD)
            .and_then(|values| values.get_mut(locale))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::Validation(format!("asset {id} has no {locale} file")))?;
        if let Some(upload) = file.remove("upload") {
            file.insert("url".to_string(), upload);
        }
        stored.sys.version += 1;
        stored.sys.updated_at = now;
        state.writes.asset_writes += 1;
        Ok(())
    }

    async fn publish_asset(&self, asset: &Asset) -> Result<Asset, StoreError> {
        let mut state = self.state();
        let pos = state.current_asset(asset)?;
        let unprocessed = state.assets[pos]
            .fields
            .get(ASSET_FILE_FIELD)
            .map(|values| values.values().any(|file| file.get("url").is_none()))
            .unwrap_or(true);
        if unprocessed {
            return Err(StoreError::Validation(format!(
                "asset {} has no processed file",
                asset.sys.id
            )));
        }
        let now = state.tick();
        let stored = &mut state.assets[pos];
        stored.sys.published_version = Some(stored.sys.version);
        stored.sys.published_at = Some(now.clone());
        stored.sys.updated_at = now;
        stored.sys.version += 1;
        let published = stored.clone();
        state.writes.asset_writes += 1;
        Ok(published)
    }

    async fn list_content_types(&self) -> Result<Vec<ContentTypeDef>, StoreError> {
        Ok(self.state().content_types.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;
    use crate::record::fields_in;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_passes_conformance() {
        let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
        assert!(report.failed == 0, "{report}");
    }

    #[tokio::test]
    async fn create_fault_is_scoped_to_content_type() {
        let store = MemoryStore::new();
        store.fail_create("dataCourse");
        assert!(store.create_entry("dataCourse", Fields::new()).await.is_err());
        assert!(store.create_entry("pageCourse", Fields::new()).await.is_ok());
    }

    #[tokio::test]
    async fn create_where_fault_matches_field_value() {
        let store = MemoryStore::new();
        store.fail_create_where("pageCourse", "slug", "x");
        let bad = fields_in("en-GB", &[("slug", json!("x"))]);
        let good = fields_in("en-GB", &[("slug", json!("y"))]);
        assert!(store.create_entry("pageCourse", bad).await.is_err());
        assert!(store.create_entry("pageCourse", good).await.is_ok());
        assert_eq!(store.writes().creates, 1);
    }

    #[tokio::test]
    async fn seed_does_not_count_as_write() {
        let store = MemoryStore::new();
        store.seed("pageCourse", Fields::new());
        assert_eq!(store.len(), 1);
        assert_eq!(store.writes(), WriteCounts::default());
    }

    #[tokio::test]
    async fn get_fault_is_not_not_found() {
        let store = MemoryStore::new();
        let e = store.seed("pageCourse", Fields::new());
        store.fail_get(e.id());
        let err = store.get_entry(e.id()).await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn tag_filter_matches_any_listed_tag() {
        let store = MemoryStore::new();
        let mut tagged = store.seed("page", Fields::new());
        tagged.tags = vec!["rebrandPages".into()];
        store.insert(tagged);
        store.seed("page", Fields::new());

        let page = store
            .list_entries(&EntryQuery::default().with_filter(TAG_FILTER, "other, rebrandPages"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn unknown_filter_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .list_entries(&EntryQuery::default().with_filter("sys.bogus", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn asset_is_processed_then_published() {
        let store = MemoryStore::new();
        let fields = fields_in(
            "en-GB",
            &[
                ("title", json!("Leaflet")),
                ("file", crate::asset::upload_file("application/pdf", "a.pdf", "https://x/a.pdf")),
            ],
        );
        let asset = store.create_asset(fields).await.unwrap();
        let err = store.publish_asset(&asset).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        store.process_asset(&asset, "en-GB").await.unwrap();
        let processed = store.get_asset(asset.id()).await.unwrap();
        assert!(processed.is_processed("en-GB"));
        assert_eq!(processed.file("en-GB").unwrap()["url"], "https://x/a.pdf");

        let published = store.publish_asset(&processed).await.unwrap();
        assert!(published.is_published());
        assert_eq!(store.writes().asset_writes, 3);
        assert_eq!(store.writes().creates, 0);
    }

    #[tokio::test]
    async fn stale_asset_version_is_rejected() {
        let store = MemoryStore::new();
        let asset = store.create_asset(Fields::new()).await.unwrap();
        store.update_asset(&asset).await.unwrap();
        assert!(matches!(
            store.update_asset(&asset).await,
            Err(StoreError::VersionMismatch { .. })
        ));
    }
}

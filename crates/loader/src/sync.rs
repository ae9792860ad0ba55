//! Entry Synchronizer: create what is missing for one record, then link it.
//!
//! Per record the order is fixed: resolve outside references, create the
//! primary entry if absent, create each absent secondary, resolve the link
//! graph, re-fetch the primary and write every reference field in a single
//! update, then publish. A failure at any step ends that record only.
//!
//! Attachments are uploaded after the secondaries: each missing file becomes
//! an asset that is processed, waited for, and linked like a secondary.

use std::fmt;
use std::time::Duration;

use cmsload_storage::{
    asset_link, entry_link, fields_in, upload_file, Asset, ContentStore, Entry, EntryRef, Fields,
    StoreError, ASSET_FILE_FIELD, ASSET_TITLE_FIELD,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::index::{ExistingIndex, ASSET_KEYS};
use crate::schema::{ContentTypeSchema, SchemaError};

/// Errors that end the processing of a single record.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{content_type}: {source}")]
    Store {
        content_type: String,
        #[source]
        source: StoreError,
    },

    /// A link was requested but the entry it should point at does not exist.
    #[error("missing reference target for '{field}' ({key})")]
    MissingReferenceTarget { field: String, key: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The store did not finish fetching an uploaded file in time.
    #[error("asset '{title}' was not processed after {attempts} checks")]
    AssetNotProcessed { title: String, attempts: u32 },

    /// The record names a file that cannot be uploaded.
    #[error("cannot attach '{field}': {reason}")]
    InvalidAttachment { field: String, reason: String },
}

impl SyncError {
    pub fn store(content_type: &str, source: StoreError) -> Self {
        SyncError::Store {
            content_type: content_type.to_string(),
            source,
        }
    }

    /// Content type the failure is attributed to, if it names one.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            SyncError::Store { content_type, .. } => Some(content_type.as_str()),
            SyncError::Schema(SchemaError::MissingField { content_type, .. })
            | SyncError::Schema(SchemaError::NotText { content_type, .. }) => {
                Some(content_type.as_str())
            }
            SyncError::Schema(SchemaError::WrongContentType { expected, .. }) => {
                Some(expected.as_str())
            }
            SyncError::AssetNotProcessed { .. } => Some(ASSET_KEYS),
            SyncError::MissingReferenceTarget { .. } | SyncError::InvalidAttachment { .. } => None,
        }
    }
}

/// A secondary content type and the primary field that references it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondarySpec {
    pub schema: &'static ContentTypeSchema,
    pub reference_field: &'static str,
}

/// A file to upload as an asset and link from a primary field.
///
/// Assets are matched by title, so the title must be unique per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub reference_field: &'static str,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    /// Public URL the store fetches the file from.
    pub upload_url: String,
}

impl Attachment {
    fn fields(&self, locale: &str) -> Fields {
        fields_in(
            locale,
            &[
                (ASSET_TITLE_FIELD, Value::String(self.title.clone())),
                (
                    ASSET_FILE_FIELD,
                    upload_file(&self.mime_type, &self.file_name, &self.upload_url),
                ),
            ],
        )
    }
}

/// Checks of a new asset before giving up on processing.
const PROCESS_ATTEMPTS: u32 = 10;

/// Pause between processing checks.
const PROCESS_POLL: Duration = Duration::from_millis(500);

/// What to create for each source record, and how the pieces link.
///
/// One implementation per loader job. The synchronizer owns ordering and
/// failure handling; a plan only maps records to field values.
pub trait LoadPlan: Send + Sync {
    type Record: Send + Sync;

    fn primary(&self) -> &'static ContentTypeSchema;

    fn secondaries(&self) -> &[SecondarySpec];

    /// Key of the primary entry for `record`.
    fn natural_key(&self, record: &Self::Record) -> String;

    /// Human readable name for logs. Defaults to the natural key.
    fn label(&self, record: &Self::Record) -> String {
        self.natural_key(record)
    }

    fn primary_fields(&self, record: &Self::Record, locale: &str) -> Fields;

    /// Fields of the `spec` entry for `record`, or `None` when this record
    /// needs no entry of that type.
    fn secondary_fields(
        &self,
        spec: &SecondarySpec,
        record: &Self::Record,
        locale: &str,
    ) -> Option<Fields>;

    /// Key of the `spec` entry for `record`. Defaults to the natural key.
    fn secondary_key(&self, spec: &SecondarySpec, record: &Self::Record) -> String {
        let _ = spec;
        self.natural_key(record)
    }

    /// References to entries outside the created graph, as primary fields.
    fn extra_links(&self, record: &Self::Record, locale: &str) -> Result<Fields, SyncError> {
        let _ = (record, locale);
        Ok(Fields::new())
    }

    /// Whether any record can carry attachments. When true the loader also
    /// indexes existing assets by title.
    fn has_attachments(&self) -> bool {
        false
    }

    /// Files to upload and link for `record`.
    fn attachments(&self, record: &Self::Record) -> Result<Vec<Attachment>, SyncError> {
        let _ = record;
        Ok(Vec::new())
    }
}

/// Result of synchronizing one record. Always logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Every required entry already existed.
    Skipped { record: String },
    Synced {
        record: String,
        created: Vec<EntryRef>,
        /// Primary fields written by the link update.
        linked: Vec<String>,
    },
    Failed {
        record: String,
        content_type: String,
        message: String,
    },
}

impl RecordOutcome {
    pub fn created(&self) -> &[EntryRef] {
        match self {
            RecordOutcome::Synced { created, .. } => created,
            _ => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RecordOutcome::Failed { .. })
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOutcome::Skipped { record } => write!(f, "skipped {record} (already exists)"),
            RecordOutcome::Synced {
                record,
                created,
                linked,
            } => {
                write!(f, "synced {record}")?;
                if !created.is_empty() {
                    let list: Vec<String> = created
                        .iter()
                        .map(|r| format!("{} {}", r.content_type, r.id))
                        .collect();
                    write!(f, ": created {}", list.join(", "))?;
                }
                if !linked.is_empty() {
                    write!(f, "; linked {}", linked.join(", "))?;
                }
                Ok(())
            }
            RecordOutcome::Failed {
                record,
                content_type,
                message,
            } => write!(f, "failed {record} on {content_type}: {message}"),
        }
    }
}

/// References from a primary entry to the entries and assets it should
/// point at.
///
/// A target stays `None` until it exists; resolving a graph with an
/// unresolved target fails instead of writing an empty link.
#[derive(Debug, Default)]
pub struct LinkGraph {
    edges: Vec<(String, String, Option<Value>)>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `target` is the link value, from `entry_link` or `asset_link`.
    pub fn link(&mut self, field: &str, key: &str, target: Option<Value>) {
        self.edges
            .push((field.to_string(), key.to_string(), target));
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// `(field, link)` pairs, or the first unresolved field.
    pub fn resolve(self) -> Result<Vec<(String, Value)>, SyncError> {
        self.edges
            .into_iter()
            .map(|(field, key, target)| match target {
                Some(link) => Ok((field, link)),
                None => Err(SyncError::MissingReferenceTarget { field, key }),
            })
            .collect()
    }
}

struct Secondary<'p> {
    spec: &'p SecondarySpec,
    key: String,
    fields: Fields,
    existing: Option<String>,
}

/// Applies a [`LoadPlan`] to one record at a time against a store.
pub struct EntrySynchronizer<'a, S: ?Sized, P> {
    store: &'a S,
    plan: &'a P,
    index: &'a ExistingIndex,
    locale: &'a str,
    publish: bool,
}

impl<'a, S, P> EntrySynchronizer<'a, S, P>
where
    S: ContentStore + ?Sized,
    P: LoadPlan,
{
    pub fn new(store: &'a S, plan: &'a P, index: &'a ExistingIndex, locale: &'a str) -> Self {
        Self {
            store,
            plan,
            index,
            locale,
            publish: false,
        }
    }

    /// Publish every entry this synchronizer creates or links.
    pub fn publishing(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    /// Synchronize one record. Errors are folded into the outcome.
    pub async fn sync(&self, record: &P::Record) -> RecordOutcome {
        let label = self.plan.label(record);
        let mut created = Vec::new();
        match self.sync_inner(record, &mut created).await {
            Ok(None) => RecordOutcome::Skipped { record: label },
            Ok(Some(linked)) => RecordOutcome::Synced {
                record: label,
                created,
                linked,
            },
            Err(e) => {
                warn!("{}: {}", label, e);
                let content_type = e
                    .content_type()
                    .unwrap_or(self.plan.primary().id)
                    .to_string();
                if !created.is_empty() {
                    debug!("{}: {} created entries left unlinked", label, created.len());
                }
                RecordOutcome::Failed {
                    record: label,
                    content_type,
                    message: e.to_string(),
                }
            }
        }
    }

    /// `Ok(None)` when nothing was missing, else the linked field names.
    async fn sync_inner(
        &self,
        record: &P::Record,
        created: &mut Vec<EntryRef>,
    ) -> Result<Option<Vec<String>>, SyncError> {
        let primary = self.plan.primary();
        let key = self.plan.natural_key(record);
        let existing_primary = self.index.id_of(primary.id, &key);

        let secondaries: Vec<Secondary<'_>> = self
            .plan
            .secondaries()
            .iter()
            .filter_map(|spec| {
                let fields = self.plan.secondary_fields(spec, record, self.locale)?;
                let key = self.plan.secondary_key(spec, record);
                let existing = self.index.id_of(spec.schema.id, &key);
                Some(Secondary {
                    spec,
                    key,
                    fields,
                    existing,
                })
            })
            .collect();

        let attachments: Vec<(Attachment, Option<String>)> = self
            .plan
            .attachments(record)?
            .into_iter()
            .map(|a| {
                let existing = self.index.id_of(ASSET_KEYS, &a.title);
                (a, existing)
            })
            .collect();

        if existing_primary.is_some()
            && secondaries.iter().all(|s| s.existing.is_some())
            && attachments.iter().all(|(_, existing)| existing.is_some())
        {
            return Ok(None);
        }

        let extra = self.plan.extra_links(record, self.locale)?;

        // Primary first, so a half-built record is found again on a rerun.
        let mut primary_entry = None;
        let primary_is_new = existing_primary.is_none();
        let primary_id = match existing_primary {
            Some(id) => id,
            None => {
                let mut fields = self.plan.primary_fields(record, self.locale);
                fields.extend(extra.clone());
                let entry = self
                    .store
                    .create_entry(primary.id, fields)
                    .await
                    .map_err(|e| SyncError::store(primary.id, e))?;
                self.index.record(primary.id, &key, entry.id());
                created.push(entry.entry_ref());
                let id = entry.id().to_string();
                primary_entry = Some(entry);
                id
            }
        };

        let mut created_secondaries: Vec<Entry> = Vec::new();
        let mut graph = LinkGraph::new();
        for secondary in secondaries {
            let schema = secondary.spec.schema;
            let field = secondary.spec.reference_field;
            match secondary.existing {
                Some(id) => {
                    if primary_is_new || !self.primary_has(&primary_id, field).await? {
                        graph.link(field, &secondary.key, Some(entry_link(&id)));
                    }
                }
                None => {
                    let entry = self
                        .store
                        .create_entry(schema.id, secondary.fields)
                        .await
                        .map_err(|e| SyncError::store(schema.id, e))?;
                    self.index.record(schema.id, &secondary.key, entry.id());
                    created.push(entry.entry_ref());
                    graph.link(field, &secondary.key, Some(entry_link(entry.id())));
                    created_secondaries.push(entry);
                }
            }
        }

        let mut uploaded: Vec<Asset> = Vec::new();
        for (attachment, existing) in attachments {
            let field = attachment.reference_field;
            match existing {
                Some(id) => {
                    if primary_is_new || !self.primary_has(&primary_id, field).await? {
                        graph.link(field, &attachment.title, Some(asset_link(&id)));
                    }
                }
                None => {
                    let asset = self.upload(&attachment, created).await?;
                    graph.link(field, &attachment.title, Some(asset_link(asset.id())));
                    uploaded.push(asset);
                }
            }
        }

        let mut updates = graph.resolve()?;
        if !primary_is_new {
            for (field, values) in &extra {
                if let Some(value) = values.get(self.locale) {
                    updates.push((field.clone(), value.clone()));
                }
            }
        }

        let mut linked = Vec::new();
        let mut final_primary = primary_entry;
        if !updates.is_empty() {
            let mut fresh = self
                .store
                .get_entry(&primary_id)
                .await
                .map_err(|e| SyncError::store(primary.id, e))?;
            for (field, value) in updates {
                // Outside references on an existing primary are never replaced.
                if extra.contains_key(&field) && fresh.field(&field, self.locale).is_some() {
                    continue;
                }
                fresh.set_field(&field, self.locale, value);
                linked.push(field);
            }
            if !linked.is_empty() {
                let updated = self
                    .store
                    .update_entry(&fresh)
                    .await
                    .map_err(|e| SyncError::store(primary.id, e))?;
                final_primary = Some(updated);
            }
        }

        if self.publish {
            for asset in &uploaded {
                self.store
                    .publish_asset(asset)
                    .await
                    .map_err(|e| SyncError::store(ASSET_KEYS, e))?;
            }
            for entry in &created_secondaries {
                self.store
                    .publish_entry(entry)
                    .await
                    .map_err(|e| SyncError::store(entry.content_type(), e))?;
            }
            if let Some(entry) = &final_primary {
                self.store
                    .publish_entry(entry)
                    .await
                    .map_err(|e| SyncError::store(primary.id, e))?;
            }
        }

        Ok(Some(linked))
    }

    /// Create the asset, ask the store to process it and wait until the
    /// file is served. Returns the processed asset.
    async fn upload(
        &self,
        attachment: &Attachment,
        created: &mut Vec<EntryRef>,
    ) -> Result<Asset, SyncError> {
        let store_err = |e: StoreError| SyncError::store(ASSET_KEYS, e);
        let asset = self
            .store
            .create_asset(attachment.fields(self.locale))
            .await
            .map_err(store_err)?;
        self.index.record(ASSET_KEYS, &attachment.title, asset.id());
        created.push(EntryRef {
            id: asset.id().to_string(),
            content_type: ASSET_KEYS.to_string(),
        });
        info!("uploading {} as asset {}", attachment.file_name, asset.id());

        self.store
            .process_asset(&asset, self.locale)
            .await
            .map_err(store_err)?;
        for attempt in 1..=PROCESS_ATTEMPTS {
            let current = self.store.get_asset(asset.id()).await.map_err(store_err)?;
            if current.is_processed(self.locale) {
                return Ok(current);
            }
            if attempt < PROCESS_ATTEMPTS {
                tokio::time::sleep(PROCESS_POLL).await;
            }
        }
        Err(SyncError::AssetNotProcessed {
            title: attachment.title.clone(),
            attempts: PROCESS_ATTEMPTS,
        })
    }

    async fn primary_has(&self, id: &str, field: &str) -> Result<bool, SyncError> {
        let entry = self
            .store
            .get_entry(id)
            .await
            .map_err(|e| SyncError::store(self.plan.primary().id, e))?;
        Ok(entry.field(field, self.locale).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmsload_storage::{asset_link_target, fields_in, link_target, MemoryStore};
    use serde_json::json;

    const PAGE: ContentTypeSchema = ContentTypeSchema::new("page", "slug", &["title"]);
    const DATA: ContentTypeSchema = ContentTypeSchema::new("data", "key", &[]);
    const META: ContentTypeSchema = ContentTypeSchema::new("meta", "internalName", &[]);
    const OWNER: ContentTypeSchema = ContentTypeSchema::new("owner", "code", &[]);
    const LOCALE: &str = "en-GB";

    struct TestPlan {
        secondaries: Vec<SecondarySpec>,
        /// When set, every record links to this owner id (None = unresolved).
        owner: Option<Option<String>>,
        /// Attach `<record>.pdf` to every record.
        documents: bool,
    }

    impl TestPlan {
        fn new() -> Self {
            Self {
                secondaries: vec![
                    SecondarySpec {
                        schema: &DATA,
                        reference_field: "course",
                    },
                    SecondarySpec {
                        schema: &META,
                        reference_field: "metaInformation",
                    },
                ],
                owner: None,
                documents: false,
            }
        }

        fn with_documents() -> Self {
            Self {
                documents: true,
                ..Self::new()
            }
        }
    }

    impl LoadPlan for TestPlan {
        type Record = &'static str;

        fn primary(&self) -> &'static ContentTypeSchema {
            &PAGE
        }

        fn secondaries(&self) -> &[SecondarySpec] {
            &self.secondaries
        }

        fn natural_key(&self, record: &&'static str) -> String {
            record.to_string()
        }

        fn primary_fields(&self, record: &&'static str, locale: &str) -> Fields {
            fields_in(
                locale,
                &[("slug", json!(record)), ("title", json!(record.to_uppercase()))],
            )
        }

        fn secondary_fields(
            &self,
            spec: &SecondarySpec,
            record: &&'static str,
            locale: &str,
        ) -> Option<Fields> {
            Some(fields_in(locale, &[(spec.schema.key_field, json!(record))]))
        }

        fn extra_links(&self, record: &&'static str, locale: &str) -> Result<Fields, SyncError> {
            match &self.owner {
                None => Ok(Fields::new()),
                Some(Some(id)) => Ok(fields_in(locale, &[("owner", entry_link(id))])),
                Some(None) => Err(SyncError::MissingReferenceTarget {
                    field: "owner".into(),
                    key: record.to_string(),
                }),
            }
        }

        fn has_attachments(&self) -> bool {
            self.documents
        }

        fn attachments(&self, record: &&'static str) -> Result<Vec<Attachment>, SyncError> {
            if !self.documents {
                return Ok(Vec::new());
            }
            Ok(vec![Attachment {
                reference_field: "document",
                title: format!("{record} Download"),
                file_name: format!("{record}.pdf"),
                mime_type: "application/pdf".into(),
                upload_url: format!("https://files.example.org/{record}.pdf"),
            }])
        }
    }

    async fn index_of(store: &MemoryStore) -> ExistingIndex {
        let mut index =
            ExistingIndex::build(store, &[&PAGE, &DATA, &META, &OWNER], &Default::default())
                .await
                .unwrap();
        index.index_assets(store, &Default::default()).await.unwrap();
        index
    }

    fn page(store: &MemoryStore, slug: &str) -> Entry {
        store
            .entries_of("page")
            .into_iter()
            .find(|e| e.text("slug", LOCALE) == Some(slug))
            .unwrap()
    }

    fn link_of(entry: &Entry, field: &str) -> Option<String> {
        entry
            .field(field, LOCALE)
            .and_then(link_target)
            .map(str::to_string)
    }

    async fn run(store: &MemoryStore, plan: &TestPlan, records: &[&'static str]) -> Vec<RecordOutcome> {
        let index = index_of(store).await;
        let sync = EntrySynchronizer::new(store, plan, &index, LOCALE);
        let mut out = Vec::new();
        for record in records {
            out.push(sync.sync(record).await);
        }
        out
    }

    #[tokio::test]
    async fn creates_primary_and_secondaries_then_links_once() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        let outcomes = run(&store, &plan, &["uc"]).await;

        assert_eq!(outcomes[0].created().len(), 3);
        let page = page(&store, "uc");
        let data = store.entries_of("data").remove(0);
        let meta = store.entries_of("meta").remove(0);
        assert_eq!(link_of(&page, "course").as_deref(), Some(data.id()));
        assert_eq!(link_of(&page, "metaInformation").as_deref(), Some(meta.id()));

        let writes = store.writes();
        assert_eq!(writes.creates, 3);
        assert_eq!(writes.updates, 1);
        assert_eq!(writes.publishes, 0);
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        run(&store, &plan, &["a", "b", "c"]).await;
        let before = store.writes();

        let outcomes = run(&store, &plan, &["a", "b", "c"]).await;
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, RecordOutcome::Skipped { .. })));
        assert_eq!(store.writes(), before);
        assert_eq!(store.entries_of("page").len(), 3);
    }

    #[tokio::test]
    async fn existing_key_is_skipped_new_key_created() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        store.seed("page", fields_in(LOCALE, &[("slug", json!("a"))]));
        store.seed("data", fields_in(LOCALE, &[("key", json!("a"))]));
        store.seed("meta", fields_in(LOCALE, &[("internalName", json!("a"))]));

        let outcomes = run(&store, &plan, &["a", "b"]).await;
        assert_eq!(
            outcomes[0],
            RecordOutcome::Skipped {
                record: "a".into()
            }
        );
        assert_eq!(outcomes[0].to_string(), "skipped a (already exists)");
        assert!(matches!(&outcomes[1], RecordOutcome::Synced { created, .. } if created.len() == 3));
        assert_eq!(store.entries_of("page").len(), 2);
    }

    #[tokio::test]
    async fn secondary_failure_leaves_primary_unlinked_and_run_continues() {
        let store = MemoryStore::new();
        store.fail_create_where("data", "key", "x");
        let plan = TestPlan::new();

        let outcomes = run(&store, &plan, &["x", "y"]).await;
        match &outcomes[0] {
            RecordOutcome::Failed {
                record,
                content_type,
                ..
            } => {
                assert_eq!(record, "x");
                assert_eq!(content_type, "data");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        let x = page(&store, "x");
        assert!(x.field("course", LOCALE).is_none());
        assert!(x.field("metaInformation", LOCALE).is_none());
        assert_eq!(x.sys.version, 1);

        assert!(matches!(outcomes[1], RecordOutcome::Synced { .. }));
        let y = page(&store, "y");
        assert!(link_of(&y, "course").is_some());
    }

    #[tokio::test]
    async fn rerun_links_existing_unlinked_primary() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        let seeded = store.seed("page", fields_in(LOCALE, &[("slug", json!("x"))]));
        // Meta survived an earlier run; data did not.
        let meta = store.seed("meta", fields_in(LOCALE, &[("internalName", json!("x"))]));

        let outcomes = run(&store, &plan, &["x"]).await;
        let RecordOutcome::Synced { created, linked, .. } = &outcomes[0] else {
            panic!("expected sync, got {:?}", outcomes[0]);
        };
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].content_type, "data");
        assert_eq!(linked.len(), 2);

        let page = store.snapshot(seeded.id()).unwrap();
        assert_eq!(link_of(&page, "metaInformation").as_deref(), Some(meta.id()));
        assert!(link_of(&page, "course").is_some());
        assert_eq!(store.entries_of("page").len(), 1);
    }

    #[tokio::test]
    async fn existing_link_on_primary_is_not_rewritten() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        let meta = store.seed("meta", fields_in(LOCALE, &[("internalName", json!("x"))]));
        let mut fields = fields_in(LOCALE, &[("slug", json!("x"))]);
        fields.extend(fields_in(LOCALE, &[("metaInformation", entry_link(meta.id()))]));
        store.seed("page", fields);

        let outcomes = run(&store, &plan, &["x"]).await;
        let RecordOutcome::Synced { linked, .. } = &outcomes[0] else {
            panic!("expected sync");
        };
        assert_eq!(linked, &vec!["course".to_string()]);
    }

    #[tokio::test]
    async fn unresolved_outside_reference_fails_before_any_write() {
        let store = MemoryStore::new();
        let mut plan = TestPlan::new();
        plan.owner = Some(None);

        let outcomes = run(&store, &plan, &["x"]).await;
        assert!(matches!(
            &outcomes[0],
            RecordOutcome::Failed { message, .. } if message.contains("owner")
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn outside_reference_is_written_on_create() {
        let store = MemoryStore::new();
        let owner = store.seed("owner", fields_in(LOCALE, &[("code", json!("O1"))]));
        let mut plan = TestPlan::new();
        plan.owner = Some(Some(owner.id().to_string()));

        run(&store, &plan, &["x"]).await;
        let page = page(&store, "x");
        assert_eq!(link_of(&page, "owner").as_deref(), Some(owner.id()));
    }

    #[tokio::test]
    async fn refetch_failure_is_not_treated_as_absent() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        let seeded = store.seed("page", fields_in(LOCALE, &[("slug", json!("x"))]));
        store.fail_get(seeded.id());

        let outcomes = run(&store, &plan, &["x"]).await;
        assert!(outcomes[0].is_failed());
        assert_eq!(store.entries_of("page").len(), 1);
    }

    #[tokio::test]
    async fn publish_covers_created_and_linked_entries() {
        let store = MemoryStore::new();
        let plan = TestPlan::new();
        let index = index_of(&store).await;
        let sync = EntrySynchronizer::new(&store, &plan, &index, LOCALE).publishing(true);
        sync.sync(&"uc").await;

        assert_eq!(store.writes().publishes, 3);
        assert!(store.entries_of("page")[0].is_published());
        assert!(store.entries_of("data")[0].is_published());
    }

    #[tokio::test]
    async fn attachment_is_uploaded_processed_and_linked() {
        let store = MemoryStore::new();
        let plan = TestPlan::with_documents();
        let outcomes = run(&store, &plan, &["uc"]).await;

        let RecordOutcome::Synced { created, linked, .. } = &outcomes[0] else {
            panic!("expected sync, got {:?}", outcomes[0]);
        };
        assert_eq!(created.len(), 4);
        assert_eq!(created[3].content_type, "Asset");
        assert!(linked.contains(&"document".to_string()));

        let assets = store.assets();
        assert_eq!(assets.len(), 1);
        assert!(assets[0].is_processed(LOCALE));
        assert_eq!(assets[0].title(LOCALE), Some("uc Download"));
        assert_eq!(assets[0].file(LOCALE).unwrap()["contentType"], "application/pdf");
        let page = page(&store, "uc");
        assert_eq!(
            page.field("document", LOCALE).and_then(asset_link_target),
            Some(assets[0].id())
        );

        let before = store.writes();
        let again = run(&store, &plan, &["uc"]).await;
        assert!(matches!(again[0], RecordOutcome::Skipped { .. }));
        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn existing_asset_is_linked_not_uploaded_again() {
        let store = MemoryStore::new();
        let plan = TestPlan::with_documents();
        let seeded = store.seed("page", fields_in(LOCALE, &[("slug", json!("x"))]));
        store.seed("data", fields_in(LOCALE, &[("key", json!("x"))]));
        store.seed("meta", fields_in(LOCALE, &[("internalName", json!("x"))]));
        let asset = store
            .create_asset(fields_in(LOCALE, &[("title", json!("x Download"))]))
            .await
            .unwrap();
        let asset_writes = store.writes().asset_writes;

        let outcomes = run(&store, &plan, &["x"]).await;
        let RecordOutcome::Synced { created, linked, .. } = &outcomes[0] else {
            panic!("expected sync, got {:?}", outcomes[0]);
        };
        assert!(created.is_empty());
        assert_eq!(linked, &vec!["document".to_string()]);
        assert_eq!(store.writes().asset_writes, asset_writes);
        let page = store.snapshot(seeded.id()).unwrap();
        assert_eq!(
            page.field("document", LOCALE).and_then(asset_link_target),
            Some(asset.id())
        );
    }

    #[tokio::test]
    async fn asset_failure_is_attributed_to_assets() {
        let store = MemoryStore::new();
        store.fail_create_asset();
        let plan = TestPlan::with_documents();

        let outcomes = run(&store, &plan, &["x"]).await;
        assert!(matches!(
            &outcomes[0],
            RecordOutcome::Failed { content_type, .. } if content_type == "Asset"
        ));
        let x = page(&store, "x");
        assert!(x.field("document", LOCALE).is_none());
        assert!(x.field("course", LOCALE).is_none());
    }

    #[tokio::test]
    async fn publish_includes_uploaded_assets() {
        let store = MemoryStore::new();
        let plan = TestPlan::with_documents();
        let index = index_of(&store).await;
        let sync = EntrySynchronizer::new(&store, &plan, &index, LOCALE).publishing(true);
        sync.sync(&"uc").await;

        assert!(store.assets()[0].is_published());
        assert_eq!(store.writes().publishes, 3);
        assert!(store.entries_of("page")[0].is_published());
    }

    #[test]
    fn link_graph_with_unresolved_target_fails() {
        let mut graph = LinkGraph::new();
        graph.link("course", "uc", Some(entry_link("d1")));
        graph.link("metaInformation", "uc", None);
        assert!(matches!(
            graph.resolve(),
            Err(SyncError::MissingReferenceTarget { field, .. }) if field == "metaInformation"
        ));
    }

    #[test]
    fn outcome_lines_name_created_entries() {
        let outcome = RecordOutcome::Synced {
            record: "uc".into(),
            created: vec![EntryRef {
                id: "mem-1".into(),
                content_type: "page".into(),
            }],
            linked: vec!["course".into()],
        };
        assert_eq!(outcome.to_string(), "synced uc: created page mem-1; linked course");
    }
}

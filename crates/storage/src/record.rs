use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size for `list_entries` queries.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page a store is required to serve.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Filter key selecting entries by publication state (`"true"` / `"false"`).
pub const DRAFT_FILTER: &str = "sys.publishedAt[exists]";

/// Filter key selecting entries carrying any of a comma-separated tag list.
pub const TAG_FILTER: &str = "metadata.tags.sys.id[in]";

/// A single field's value keyed by locale code (e.g. `"en-GB"`).
pub type LocalizedValue = BTreeMap<String, Value>;

/// All fields of an entry: field name -> locale -> value.
pub type Fields = BTreeMap<String, LocalizedValue>;

/// System metadata of an entry, owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySys {
    pub id: String,
    pub content_type: String,
    /// Bumped by the store on every write, including publish.
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
    /// None while the entry has never been published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<i64>,
}

/// An entry as stored in a content environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub sys: EntrySys,
    #[serde(default)]
    pub fields: Fields,
    /// Tag ids from the entry's metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Entry {
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn content_type(&self) -> &str {
        &self.sys.content_type
    }

    /// Raw value of `name` in `locale`, if set.
    pub fn field(&self, name: &str, locale: &str) -> Option<&Value> {
        self.fields.get(name).and_then(|values| values.get(locale))
    }

    /// String value of `name` in `locale`. Non-string values yield `None`.
    pub fn text(&self, name: &str, locale: &str) -> Option<&str> {
        self.field(name, locale).and_then(Value::as_str)
    }

    pub fn set_field(&mut self, name: &str, locale: &str, value: Value) {
        self.fields
            .entry(name.to_string())
            .or_default()
            .insert(locale.to_string(), value);
    }

    pub fn is_published(&self) -> bool {
        self.sys.published_at.is_some()
    }

    pub fn is_draft(&self) -> bool {
        !self.is_published()
    }

    pub fn entry_ref(&self) -> EntryRef {
        EntryRef {
            id: self.sys.id.clone(),
            content_type: self.sys.content_type.clone(),
        }
    }

    /// Ids of every entry referenced from any field in any locale,
    /// including links nested inside arrays and rich-text documents.
    /// Duplicates are removed; first-seen order is kept.
    pub fn linked_entry_ids(&self) -> Vec<String> {
        self.linked_ids("Entry")
    }

    /// Ids of every asset referenced from any field, as for entries.
    pub fn linked_asset_ids(&self) -> Vec<String> {
        self.linked_ids("Asset")
    }

    fn linked_ids(&self, link_type: &str) -> Vec<String> {
        let mut ids = Vec::new();
        for values in self.fields.values() {
            for value in values.values() {
                collect_links(value, link_type, &mut ids);
            }
        }
        ids
    }
}

fn collect_links(value: &Value, link_type: &str, out: &mut Vec<String>) {
    if let Some((kind, id)) = link_parts(value) {
        if kind == link_type && !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
        return;
    }
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_links(v, link_type, out)),
        Value::Object(map) => map.values().for_each(|v| collect_links(v, link_type, out)),
        _ => {}
    }
}

/// `(linkType, id)` of a link value.
fn link_parts(value: &Value) -> Option<(&str, &str)> {
    let sys = value.get("sys")?;
    if sys.get("type")?.as_str()? != "Link" {
        return None;
    }
    Some((sys.get("linkType")?.as_str()?, sys.get("id")?.as_str()?))
}

/// Single-locale fields from `(name, value)` pairs.
pub fn fields_in(locale: &str, pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| {
            let mut locales = LocalizedValue::new();
            locales.insert(locale.to_string(), value.clone());
            (name.to_string(), locales)
        })
        .collect()
}

/// Identity of an entry: its store id and content type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRef {
    pub id: String,
    pub content_type: String,
}

/// Reference value pointing at entry `id`.
pub fn entry_link(id: &str) -> Value {
    serde_json::json!({
        "sys": {
            "type": "Link",
            "linkType": "Entry",
            "id": id,
        }
    })
}

/// Target id of an entry link value, or `None` if `value` is not one.
pub fn link_target(value: &Value) -> Option<&str> {
    match link_parts(value)? {
        ("Entry", id) => Some(id),
        _ => None,
    }
}

/// Target id of an asset link value, or `None` if `value` is not one.
pub fn asset_link_target(value: &Value) -> Option<&str> {
    match link_parts(value)? {
        ("Asset", id) => Some(id),
        _ => None,
    }
}

/// Parameters for one `list_entries` or `list_assets` page.
///
/// `filters` uses the store's query syntax: `fields.<name>` equality,
/// [`DRAFT_FILTER`], [`TAG_FILTER`] and `sys.id`. Asset listings ignore
/// `content_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub content_type: Option<String>,
    pub skip: usize,
    pub limit: usize,
    pub filters: BTreeMap<String, String>,
}

impl Default for EntryQuery {
    fn default() -> Self {
        Self {
            content_type: None,
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
        }
    }
}

impl EntryQuery {
    pub fn for_type(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    /// Restrict to entries that have never been published.
    pub fn drafts_only(self) -> Self {
        self.with_filter(DRAFT_FILTER, "false")
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of items matching the query across all pages.
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

pub type EntryPage = Page<Entry>;

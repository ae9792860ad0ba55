//! Management API JSON shapes and their conversion to store records.

use cmsload_storage::{
    Asset, AssetSys, ContentTypeDef, Entry, EntryQuery, EntrySys, FieldDef, Fields, Page,
    StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LinkSys {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub link_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct Link {
    pub sys: LinkSys,
}

impl Link {
    fn tag(id: &str) -> Self {
        Link {
            sys: LinkSys {
                id: id.to_string(),
                kind: "Link".to_string(),
                link_type: "Tag".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSys {
    pub id: String,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub published_version: Option<i64>,
    pub content_type: Link,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Metadata {
    #[serde(default)]
    pub tags: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireEntry {
    pub sys: WireSys,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<WireEntry> for Entry {
    fn from(wire: WireEntry) -> Self {
        Entry {
            sys: EntrySys {
                id: wire.sys.id,
                content_type: wire.sys.content_type.sys.id,
                version: wire.sys.version,
                created_at: wire.sys.created_at,
                updated_at: wire.sys.updated_at,
                published_at: wire.sys.published_at,
                published_version: wire.sys.published_version,
            },
            fields: wire.fields,
            tags: wire.metadata.tags.into_iter().map(|t| t.sys.id).collect(),
        }
    }
}

/// Asset sys block; like [`WireSys`] without a content type.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireAssetSys {
    pub id: String,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub published_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAsset {
    pub sys: WireAssetSys,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<WireAsset> for Asset {
    fn from(wire: WireAsset) -> Self {
        Asset {
            sys: AssetSys {
                id: wire.sys.id,
                version: wire.sys.version,
                created_at: wire.sys.created_at,
                updated_at: wire.sys.updated_at,
                published_at: wire.sys.published_at,
                published_version: wire.sys.published_version,
            },
            fields: wire.fields,
            tags: wire.metadata.tags.into_iter().map(|t| t.sys.id).collect(),
        }
    }
}

/// One page of a listing, generic over the item shape.
#[derive(Debug, Deserialize)]
pub(crate) struct WireCollection<T> {
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<W> WireCollection<W> {
    pub(crate) fn into_page<T: From<W>>(self) -> Page<T> {
        Page {
            items: self.items.into_iter().map(T::from).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireContentTypeSys {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireContentType {
    pub sys: WireContentTypeSys,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl From<WireContentType> for ContentTypeDef {
    fn from(wire: WireContentType) -> Self {
        ContentTypeDef {
            id: wire.sys.id,
            name: wire.name,
            description: wire.description.filter(|d| !d.is_empty()),
            display_field: wire.display_field,
            fields: wire.fields,
        }
    }
}

/// Request body for a create or update. Tags are sent only when present so
/// that creates never carry an empty metadata block.
pub(crate) fn entry_payload(fields: &Fields, tags: &[String]) -> Value {
    if tags.is_empty() {
        return json!({ "fields": fields });
    }
    let tags: Vec<Link> = tags.iter().map(|t| Link::tag(t)).collect();
    json!({ "fields": fields, "metadata": { "tags": tags } })
}

/// Query-string pairs for one `list_entries` or `list_assets` page.
pub(crate) fn query_pairs(query: &EntryQuery) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(query.filters.len() + 3);
    if let Some(content_type) = &query.content_type {
        pairs.push(("content_type".to_string(), content_type.clone()));
    }
    pairs.push(("skip".to_string(), query.skip.to_string()));
    pairs.push(("limit".to_string(), query.limit.to_string()));
    for (key, value) in &query.filters {
        pairs.push((key.clone(), value.clone()));
    }
    pairs
}

/// What the failed request was acting on, for error mapping.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    /// A listing; no single entry or asset involved.
    Collection,
    /// Creating `id` with a caller-chosen id.
    NewEntry(&'a str),
    /// An existing entry or asset, optionally at the version sent.
    Entry(&'a str, Option<i64>),
}

/// `message` of an API error body, or the raw body when it is not one.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map a non-success HTTP status onto the store's error contract.
pub(crate) fn status_error(status: u16, message: String, target: Target<'_>) -> StoreError {
    match (status, target) {
        (404, Target::Entry(id, _)) | (404, Target::NewEntry(id)) => StoreError::NotFound {
            id: id.to_string(),
        },
        (409, Target::NewEntry(id)) => StoreError::AlreadyExists { id: id.to_string() },
        (409, Target::Entry(id, Some(expected))) => StoreError::VersionMismatch {
            id: id.to_string(),
            expected,
        },
        (429, _) => StoreError::RateLimited,
        (401, _) | (403, _) => StoreError::Unauthorized(message),
        (400, _) | (422, _) => StoreError::Validation(message),
        _ => StoreError::Backend(format!("HTTP {}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmsload_storage::{EntryPage, DRAFT_FILTER, TAG_FILTER};

    const ENTRY: &str = r#"{
        "metadata": { "tags": [ { "sys": { "type": "Link", "linkType": "Tag", "id": "rebrandPages" } } ] },
        "sys": {
            "space": { "sys": { "type": "Link", "linkType": "Space", "id": "sp1" } },
            "id": "5KsDBWseXY6QegucYAoacS",
            "type": "Entry",
            "createdAt": "2026-02-01T10:00:00.000Z",
            "updatedAt": "2026-02-03T10:00:00.000Z",
            "publishedAt": "2026-02-02T10:00:00.000Z",
            "publishedVersion": 4,
            "version": 6,
            "contentType": { "sys": { "type": "Link", "linkType": "ContentType", "id": "pageCourse" } }
        },
        "fields": {
            "slug": { "en-GB": "uc-health" },
            "course": { "en-GB": { "sys": { "type": "Link", "linkType": "Entry", "id": "abc" } } }
        }
    }"#;

    #[test]
    fn entry_converts_sys_tags_and_fields() {
        let wire: WireEntry = serde_json::from_str(ENTRY).unwrap();
        let entry = Entry::from(wire);
        assert_eq!(entry.id(), "5KsDBWseXY6QegucYAoacS");
        assert_eq!(entry.content_type(), "pageCourse");
        assert_eq!(entry.sys.version, 6);
        assert_eq!(entry.sys.published_version, Some(4));
        assert!(entry.is_published());
        assert_eq!(entry.tags, vec!["rebrandPages"]);
        assert_eq!(entry.text("slug", "en-GB"), Some("uc-health"));
        assert_eq!(entry.linked_entry_ids(), vec!["abc"]);
    }

    #[test]
    fn draft_without_metadata_converts() {
        let wire: WireEntry = serde_json::from_str(
            r#"{ "sys": { "id": "d1", "version": 1, "createdAt": "t", "updatedAt": "t",
                 "contentType": { "sys": { "id": "dataCourse" } } } }"#,
        )
        .unwrap();
        let entry = Entry::from(wire);
        assert!(entry.is_draft());
        assert!(entry.tags.is_empty());
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn collection_keeps_paging_numbers() {
        let body = format!(r#"{{ "sys": {{ "type": "Array" }}, "total": 250, "skip": 100, "limit": 100, "items": [{ENTRY}] }}"#);
        let page: EntryPage = serde_json::from_str::<WireCollection<WireEntry>>(&body)
            .unwrap()
            .into_page();
        assert_eq!(page.total, 250);
        assert_eq!(page.skip, 100);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn asset_converts_without_content_type() {
        let wire: WireAsset = serde_json::from_str(
            r#"{ "sys": { "id": "as1", "type": "Asset", "version": 3, "createdAt": "t", "updatedAt": "u" },
                 "fields": {
                     "title": { "en-GB": "Aberdeen City Council DHP Download" },
                     "file": { "en-GB": { "contentType": "application/pdf", "fileName": "dhp_abd.pdf",
                                          "url": "//assets.ctfassets.net/sp1/as1/dhp_abd.pdf" } }
                 } }"#,
        )
        .unwrap();
        let asset = Asset::from(wire);
        assert_eq!(asset.id(), "as1");
        assert_eq!(asset.sys.version, 3);
        assert!(!asset.is_published());
        assert!(asset.is_processed("en-GB"));
        assert_eq!(asset.title("en-GB"), Some("Aberdeen City Council DHP Download"));
    }

    #[test]
    fn content_type_keeps_field_definitions() {
        let wire: WireContentType = serde_json::from_str(
            r#"{ "sys": { "id": "dataContactPoint", "type": "ContentType" },
                 "name": "Contact point", "description": "", "displayField": "title",
                 "fields": [
                     { "id": "title", "name": "Title", "type": "Symbol", "required": true,
                       "localized": false, "disabled": false, "omitted": false, "validations": [] },
                     { "id": "documentDownload", "name": "Document", "type": "Link", "linkType": "Asset" }
                 ] }"#,
        )
        .unwrap();
        let def = ContentTypeDef::from(wire);
        assert_eq!(def.id, "dataContactPoint");
        assert_eq!(def.description, None);
        assert_eq!(def.display_field.as_deref(), Some("title"));
        assert_eq!(def.fields.len(), 2);
        assert!(def.fields[0].required);
        assert_eq!(def.fields[1].link_type.as_deref(), Some("Asset"));
        assert!(!def.fields[1].required);
    }

    #[test]
    fn payload_omits_empty_tags() {
        let fields = cmsload_storage::fields_in("en-GB", &[("name", json!("x"))]);
        assert!(entry_payload(&fields, &[]).get("metadata").is_none());
        let with_tags = entry_payload(&fields, &["t1".to_string()]);
        assert_eq!(with_tags["metadata"]["tags"][0]["sys"]["linkType"], "Tag");
        assert_eq!(with_tags["metadata"]["tags"][0]["sys"]["id"], "t1");
    }

    #[test]
    fn query_pairs_in_order() {
        let query = EntryQuery::for_type("pageCourse")
            .drafts_only()
            .with_filter(TAG_FILTER, "a,b")
            .page(200, 50);
        let pairs = query_pairs(&query);
        assert_eq!(pairs[0], ("content_type".to_string(), "pageCourse".to_string()));
        assert_eq!(pairs[1], ("skip".to_string(), "200".to_string()));
        assert_eq!(pairs[2], ("limit".to_string(), "50".to_string()));
        assert!(pairs.contains(&(DRAFT_FILTER.to_string(), "false".to_string())));
        assert!(pairs.contains(&(TAG_FILTER.to_string(), "a,b".to_string())));
        assert_eq!(
            query_pairs(&EntryQuery::default())[0].0,
            "skip",
            "no content type means every type"
        );
    }

    #[test]
    fn statuses_map_to_store_errors() {
        let msg = || "m".to_string();
        assert!(status_error(404, msg(), Target::Entry("e", None)).is_not_found());
        assert!(matches!(
            status_error(409, msg(), Target::Entry("e", Some(3))),
            StoreError::VersionMismatch { expected: 3, .. }
        ));
        assert!(matches!(
            status_error(409, msg(), Target::NewEntry("e")),
            StoreError::AlreadyExists { .. }
        ));
        assert!(matches!(
            status_error(429, msg(), Target::Collection),
            StoreError::RateLimited
        ));
        assert!(matches!(
            status_error(403, msg(), Target::Collection),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(422, msg(), Target::Entry("e", None)),
            StoreError::Validation(_)
        ));
        // A missing environment is not a missing entry.
        assert!(matches!(
            status_error(404, msg(), Target::Collection),
            StoreError::Backend(_)
        ));
        assert!(matches!(
            status_error(503, msg(), Target::Entry("e", None)),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn error_message_prefers_api_message() {
        assert_eq!(
            error_message(r#"{"sys":{"type":"Error","id":"NotFound"},"message":"The resource could not be found."}"#),
            "The resource could not be found."
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }
}

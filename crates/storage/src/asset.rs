use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::record::{Fields, Page};

/// Field holding an asset's display title.
pub const ASSET_TITLE_FIELD: &str = "title";

/// Field holding an asset's per-locale file description.
pub const ASSET_FILE_FIELD: &str = "file";

pub type AssetPage = Page<Asset>;

/// System metadata of an asset, owned by the store. Assets have no content
/// type; otherwise versioning and publishing work as for entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSys {
    pub id: String,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<i64>,
}

/// A media asset: a title and one file per locale.
///
/// A new asset's file carries an `upload` URL. Processing fetches it and
/// replaces it with a served `url`; only processed assets can be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub sys: AssetSys,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Asset {
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn title(&self, locale: &str) -> Option<&str> {
        self.fields
            .get(ASSET_TITLE_FIELD)
            .and_then(|values| values.get(locale))
            .and_then(Value::as_str)
    }

    /// File description in `locale`, if any.
    pub fn file(&self, locale: &str) -> Option<&Value> {
        self.fields
            .get(ASSET_FILE_FIELD)
            .and_then(|values| values.get(locale))
    }

    /// `true` once the file in `locale` has a served url.
    pub fn is_processed(&self, locale: &str) -> bool {
        self.file(locale)
            .and_then(|file| file.get("url"))
            .and_then(Value::as_str)
            .is_some()
    }

    pub fn is_published(&self) -> bool {
        self.sys.published_at.is_some()
    }
}

/// File description for a new asset, fetched from `upload_url` on processing.
pub fn upload_file(mime_type: &str, file_name: &str, upload_url: &str) -> Value {
    json!({
        "contentType": mime_type,
        "fileName": file_name,
        "upload": upload_url,
    })
}

/// Reference value pointing at asset `id`.
pub fn asset_link(id: &str) -> Value {
    json!({
        "sys": {
            "type": "Link",
            "linkType": "Asset",
            "id": id,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fields_in;

    fn asset(file: Value) -> Asset {
        Asset {
            sys: AssetSys {
                id: "a1".into(),
                version: 1,
                created_at: "2026-01-01T00:00:00Z".into(),
                updated_at: "2026-01-01T00:00:00Z".into(),
                published_at: None,
                published_version: None,
            },
            fields: fields_in("en-GB", &[("title", json!("Leaflet")), ("file", file)]),
            tags: Vec::new(),
        }
    }

    #[test]
    fn upload_is_not_processed_until_url_appears() {
        let pending = asset(upload_file("application/pdf", "a.pdf", "https://x/a.pdf"));
        assert_eq!(pending.title("en-GB"), Some("Leaflet"));
        assert!(!pending.is_processed("en-GB"));

        let served = asset(json!({ "fileName": "a.pdf", "url": "//cdn/a.pdf" }));
        assert!(served.is_processed("en-GB"));
        assert!(!served.is_processed("cy-GB"));
    }
}

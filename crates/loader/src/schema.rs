//! Per-content-type field schemas.
//!
//! A schema names the field holding the natural key and the fields every
//! entry of the type must carry. Entries read back from the store are checked
//! against it instead of being inspected field by field.

use cmsload_storage::Entry;

/// Ways an entry can fail to match its [`ContentTypeSchema`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{content_type} entry {entry_id} has no '{field}' value")]
    MissingField {
        content_type: String,
        field: String,
        entry_id: String,
    },

    #[error("{content_type} entry {entry_id}: '{field}' is not text")]
    NotText {
        content_type: String,
        field: String,
        entry_id: String,
    },

    #[error("entry {entry_id} is a {actual}, expected {expected}")]
    WrongContentType {
        expected: String,
        actual: String,
        entry_id: String,
    },
}

/// Field layout of one content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeSchema {
    pub id: &'static str,
    /// Text field whose value is the natural key.
    pub key_field: &'static str,
    /// Fields that must be present (the key field is implied).
    pub required: &'static [&'static str],
}

impl ContentTypeSchema {
    pub const fn new(
        id: &'static str,
        key_field: &'static str,
        required: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            key_field,
            required,
        }
    }

    /// The natural key of `entry` in `locale`.
    pub fn natural_key(&self, entry: &Entry, locale: &str) -> Result<String, SchemaError> {
        self.check_type(entry)?;
        match entry.field(self.key_field, locale) {
            None => Err(self.missing(entry, self.key_field)),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| SchemaError::NotText {
                    content_type: self.id.to_string(),
                    field: self.key_field.to_string(),
                    entry_id: entry.id().to_string(),
                }),
        }
    }

    /// Check that every required field (and the key) is set in `locale`.
    pub fn validate(&self, entry: &Entry, locale: &str) -> Result<(), SchemaError> {
        self.natural_key(entry, locale)?;
        for field in self.required {
            if entry.field(field, locale).is_none() {
                return Err(self.missing(entry, field));
            }
        }
        Ok(())
    }

    fn check_type(&self, entry: &Entry) -> Result<(), SchemaError> {
        if entry.content_type() != self.id {
            return Err(SchemaError::WrongContentType {
                expected: self.id.to_string(),
                actual: entry.content_type().to_string(),
                entry_id: entry.id().to_string(),
            });
        }
        Ok(())
    }

    fn missing(&self, entry: &Entry, field: &str) -> SchemaError {
        SchemaError::MissingField {
            content_type: self.id.to_string(),
            field: field.to_string(),
            entry_id: entry.id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmsload_storage::{fields_in, MemoryStore};
    use serde_json::json;

    const PAGE: ContentTypeSchema =
        ContentTypeSchema::new("pageCourse", "slug", &["title"]);

    #[test]
    fn natural_key_reads_key_field() {
        let store = MemoryStore::new();
        let entry = store.seed(
            "pageCourse",
            fields_in("en-GB", &[("slug", json!("uc")), ("title", json!("UC"))]),
        );
        assert_eq!(PAGE.natural_key(&entry, "en-GB").unwrap(), "uc");
        assert!(PAGE.validate(&entry, "en-GB").is_ok());
    }

    #[test]
    fn missing_key_is_typed_error() {
        let store = MemoryStore::new();
        let entry = store.seed("pageCourse", fields_in("en-GB", &[("title", json!("UC"))]));
        let err = PAGE.natural_key(&entry, "en-GB").unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                content_type: "pageCourse".into(),
                field: "slug".into(),
                entry_id: entry.id().to_string(),
            }
        );
    }

    #[test]
    fn key_in_other_locale_counts_as_missing() {
        let store = MemoryStore::new();
        let entry = store.seed("pageCourse", fields_in("cy-GB", &[("slug", json!("uc"))]));
        assert!(matches!(
            PAGE.natural_key(&entry, "en-GB"),
            Err(SchemaError::MissingField { .. })
        ));
    }

    #[test]
    fn non_text_key_rejected() {
        let store = MemoryStore::new();
        let entry = store.seed("pageCourse", fields_in("en-GB", &[("slug", json!(7))]));
        assert!(matches!(
            PAGE.natural_key(&entry, "en-GB"),
            Err(SchemaError::NotText { .. })
        ));
    }

    #[test]
    fn validate_requires_declared_fields() {
        let store = MemoryStore::new();
        let entry = store.seed("pageCourse", fields_in("en-GB", &[("slug", json!("uc"))]));
        assert!(matches!(
            PAGE.validate(&entry, "en-GB"),
            Err(SchemaError::MissingField { field, .. }) if field == "title"
        ));
    }

    #[test]
    fn wrong_type_rejected() {
        let store = MemoryStore::new();
        let entry = store.seed("dataCourse", fields_in("en-GB", &[("slug", json!("uc"))]));
        assert!(matches!(
            PAGE.natural_key(&entry, "en-GB"),
            Err(SchemaError::WrongContentType { .. })
        ));
    }
}

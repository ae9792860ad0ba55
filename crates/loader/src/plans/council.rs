//! Local authorities and the council services that point at them.
//!
//! Authorities load first. Contact points are then keyed by
//! `"<council> <service> Service"` and reference their authority through a
//! directory built from the authority index. A record's `documentDownload`
//! is uploaded as an asset titled `"<council> <service> Download"`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use cmsload_storage::{entry_link, fields_in, Fields};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::index::ExistingIndex;
use crate::richtext::markdown_to_rich_text;
use crate::schema::ContentTypeSchema;
use crate::sync::{Attachment, LoadPlan, SecondarySpec, SyncError};

pub const LOCAL_AUTHORITY: ContentTypeSchema = ContentTypeSchema::new(
    "dataLocalAuthority",
    "shortCode",
    &["title", "authorityType"],
);

pub const CONTACT_POINT: ContentTypeSchema = ContentTypeSchema::new(
    "dataContactPoint",
    "internalTitle",
    &["localAuthority", "serviceType"],
);

pub const EXTERNAL_LINK: ContentTypeSchema =
    ContentTypeSchema::new("topicExternalLink", "name", &["title", "URL"]);

const CONTACT_LINKS: &[SecondarySpec] = &[SecondarySpec {
    schema: &EXTERNAL_LINK,
    reference_field: "link",
}];

/// Contact point field linking the downloadable document.
pub const DOCUMENT_FIELD: &str = "documentDownload";

/// Dataset file listing every authority.
pub const COUNCILS_FILE: &str = "councils.json";

/// One local authority from the councils dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilRecord {
    pub title: String,
    pub short_code: String,
    pub authority_type: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAuthorityPlan;

impl LoadPlan for LocalAuthorityPlan {
    type Record = CouncilRecord;

    fn primary(&self) -> &'static ContentTypeSchema {
        &LOCAL_AUTHORITY
    }

    fn secondaries(&self) -> &[SecondarySpec] {
        &[]
    }

    fn natural_key(&self, record: &CouncilRecord) -> String {
        record.short_code.clone()
    }

    fn label(&self, record: &CouncilRecord) -> String {
        format!("{} ({})", record.title, record.short_code)
    }

    fn primary_fields(&self, record: &CouncilRecord, locale: &str) -> Fields {
        fields_in(
            locale,
            &[
                ("title", json!(record.title)),
                ("shortCode", json!(record.short_code)),
                ("authorityType", json!(record.authority_type)),
            ],
        )
    }

    fn secondary_fields(&self, _: &SecondarySpec, _: &CouncilRecord, _: &str) -> Option<Fields> {
        None
    }
}

/// Council services with their own contact dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Service {
    Dhp,
    Homelessness,
    CouncilHousing,
    Lwa,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::Dhp,
        Service::Homelessness,
        Service::CouncilHousing,
        Service::Lwa,
    ];

    /// Value of the `serviceType` field.
    pub fn service_type(self) -> &'static str {
        match self {
            Service::Dhp => "DHP",
            Service::Homelessness => "Homelessness",
            Service::CouncilHousing => "Council Housing",
            Service::Lwa => "LWA",
        }
    }

    /// Command-line and file-name form.
    pub fn slug(self) -> &'static str {
        match self {
            Service::Dhp => "dhp",
            Service::Homelessness => "homelessness",
            Service::CouncilHousing => "council-housing",
            Service::Lwa => "lwa",
        }
    }

    /// Dataset file for this service, e.g. `council-housing.json`.
    pub fn data_file(self) -> String {
        format!("{}.json", self.slug())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_type())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.slug() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                format!(
                    "unknown service '{s}' (expected one of: dhp, homelessness, council-housing, lwa)"
                )
            })
    }
}

/// One council's contact details for a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub short_code: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ooo_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub web_link: Option<String>,
    /// Markdown body.
    #[serde(default)]
    pub text: Option<String>,
    /// Path or URL of a form to attach. `"/"` means none.
    #[serde(default)]
    pub document_download: Option<String>,
}

/// Media type for a document, by extension. Anything unrecognised is
/// assumed to be a PDF.
pub fn document_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/pdf",
    }
}

fn is_absolute_url(path: &str) -> bool {
    path.starts_with("https://") || path.starts_with("http://")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Authority {
    title: String,
    id: Option<String>,
}

/// Short code -> council title and authority entry id.
#[derive(Debug, Clone, Default)]
pub struct CouncilDirectory {
    by_code: BTreeMap<String, Authority>,
}

impl CouncilDirectory {
    /// Titles from `councils`, ids from an index over [`LOCAL_AUTHORITY`].
    pub fn new(councils: &[CouncilRecord], index: &ExistingIndex) -> Self {
        let by_code = councils
            .iter()
            .map(|c| {
                (
                    c.short_code.clone(),
                    Authority {
                        title: c.title.clone(),
                        id: index.id_of(LOCAL_AUTHORITY.id, &c.short_code),
                    },
                )
            })
            .collect();
        Self { by_code }
    }

    pub fn title(&self, short_code: &str) -> Option<&str> {
        self.by_code.get(short_code).map(|a| a.title.as_str())
    }

    pub fn authority_id(&self, short_code: &str) -> Option<&str> {
        self.by_code.get(short_code).and_then(|a| a.id.as_deref())
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Contact points for one [`Service`].
pub struct ContactPointPlan {
    service: Service,
    directory: CouncilDirectory,
    downloads_url: Option<String>,
}

impl ContactPointPlan {
    pub fn new(service: Service, directory: CouncilDirectory) -> Self {
        Self {
            service,
            directory,
            downloads_url: None,
        }
    }

    /// Base URL that relative `documentDownload` paths are served from.
    pub fn with_downloads_url(mut self, url: Option<String>) -> Self {
        self.downloads_url = url;
        self
    }

    fn council_title<'r>(&'r self, record: &'r ServiceRecord) -> &'r str {
        self.directory
            .title(&record.short_code)
            .unwrap_or(&record.short_code)
    }
}

impl LoadPlan for ContactPointPlan {
    type Record = ServiceRecord;

    fn primary(&self) -> &'static ContentTypeSchema {
        &CONTACT_POINT
    }

    fn secondaries(&self) -> &[SecondarySpec] {
        CONTACT_LINKS
    }

    fn natural_key(&self, record: &ServiceRecord) -> String {
        format!("{} {} Service", self.council_title(record), self.service)
    }

    fn primary_fields(&self, record: &ServiceRecord, locale: &str) -> Fields {
        let mut pairs: Vec<(&str, Value)> = vec![
            ("internalTitle", json!(self.natural_key(record))),
            ("serviceType", json!(self.service.service_type())),
        ];
        let optional = [
            ("phone", &record.phone),
            ("oooPhone", &record.ooo_phone),
            ("address", &record.address),
            ("email", &record.email),
        ];
        for (field, value) in optional {
            if let Some(text) = non_empty(value) {
                pairs.push((field, json!(text)));
            }
        }
        if let Some(markdown) = non_empty(&record.text) {
            pairs.push(("text", markdown_to_rich_text(markdown)));
        }
        fields_in(locale, &pairs)
    }

    fn secondary_fields(
        &self,
        _: &SecondarySpec,
        record: &ServiceRecord,
        locale: &str,
    ) -> Option<Fields> {
        let url = non_empty(&record.web_link)?;
        Some(fields_in(
            locale,
            &[
                ("name", json!(self.natural_key(record))),
                (
                    "title",
                    json!(format!("{} {}", self.council_title(record), self.service)),
                ),
                ("newTab", json!(false)),
                ("URL", json!(url)),
            ],
        ))
    }

    fn extra_links(&self, record: &ServiceRecord, locale: &str) -> Result<Fields, SyncError> {
        let id = self.directory.authority_id(&record.short_code).ok_or_else(|| {
            SyncError::MissingReferenceTarget {
                field: "localAuthority".to_string(),
                key: record.short_code.clone(),
            }
        })?;
        Ok(fields_in(locale, &[("localAuthority", entry_link(id))]))
    }

    fn has_attachments(&self) -> bool {
        true
    }

    fn attachments(&self, record: &ServiceRecord) -> Result<Vec<Attachment>, SyncError> {
        let Some(path) = non_empty(&record.document_download).filter(|p| *p != "/") else {
            return Ok(Vec::new());
        };
        let (upload_url, file_name) = if is_absolute_url(path) {
            let name = path.rsplit('/').next().unwrap_or(path);
            (path.to_string(), name.to_string())
        } else {
            let base = self
                .downloads_url
                .as_deref()
                .ok_or_else(|| SyncError::InvalidAttachment {
                    field: DOCUMENT_FIELD.to_string(),
                    reason: format!("relative path '{path}' needs a downloads URL"),
                })?;
            let relative = path.trim_start_matches('/');
            (
                format!("{}/{}", base.trim_end_matches('/'), relative),
                relative.replace('/', "_"),
            )
        };
        Ok(vec![Attachment {
            reference_field: DOCUMENT_FIELD,
            title: format!("{} {} Download", self.council_title(record), self.service),
            mime_type: document_mime(&file_name).to_string(),
            file_name,
            upload_url,
        }])
    }
}

//! Course pages from the course-template feed.
//!
//! Each template becomes a `pageCourse` keyed by slug, a `dataCourse` keyed
//! by template id, and a `topicPageMetaInformation` carrying SEO text. The
//! page links to both.

use cmsload_storage::{fields_in, Fields};
use serde::Deserialize;
use serde_json::json;

use crate::schema::ContentTypeSchema;
use crate::sync::{LoadPlan, SecondarySpec};

pub const PAGE_COURSE: ContentTypeSchema = ContentTypeSchema::new(
    "pageCourse",
    "slug",
    &["title"],
);

pub const DATA_COURSE: ContentTypeSchema =
    ContentTypeSchema::new("dataCourse", "templateIdString", &["name"]);

pub const META_INFORMATION: ContentTypeSchema = ContentTypeSchema::new(
    "topicPageMetaInformation",
    "internalName",
    &["title", "description"],
);

/// Collection queried on the course feed.
pub const COURSE_COLLECTION: &str = "allCourseTemplate";

/// Node fields requested from the course feed.
pub const COURSE_FIELDS: &[&str] = &["templateName", "templateIdString"];

const COURSE_LINKS: &[SecondarySpec] = &[
    SecondarySpec {
        schema: &DATA_COURSE,
        reference_field: "course",
    },
    SecondarySpec {
        schema: &META_INFORMATION,
        reference_field: "metaInformation",
    },
];

/// One course template from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub template_name: String,
    pub template_id_string: String,
}

/// SEO description for a course page.
pub fn seo_description(template_name: &str) -> String {
    format!(
        "Book the {template_name} training course: find upcoming dates, who it is for and what you will learn."
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoursePlan;

impl LoadPlan for CoursePlan {
    type Record = CourseRecord;

    fn primary(&self) -> &'static ContentTypeSchema {
        &PAGE_COURSE
    }

    fn secondaries(&self) -> &[SecondarySpec] {
        COURSE_LINKS
    }

    fn natural_key(&self, record: &CourseRecord) -> String {
        record.template_id_string.clone()
    }

    fn label(&self, record: &CourseRecord) -> String {
        format!("{} ({})", record.template_name, record.template_id_string)
    }

    fn primary_fields(&self, record: &CourseRecord, locale: &str) -> Fields {
        fields_in(
            locale,
            &[
                ("title", json!(record.template_name)),
                ("slug", json!(record.template_id_string)),
            ],
        )
    }

    fn secondary_fields(
        &self,
        spec: &SecondarySpec,
        record: &CourseRecord,
        locale: &str,
    ) -> Option<Fields> {
        match spec.schema.id {
            "dataCourse" => Some(fields_in(
                locale,
                &[
                    ("name", json!(record.template_name)),
                    ("templateIdString", json!(record.template_id_string)),
                ],
            )),
            "topicPageMetaInformation" => Some(fields_in(
                locale,
                &[
                    ("internalName", json!(record.template_id_string)),
                    ("title", json!(record.template_name)),
                    ("description", json!(seo_description(&record.template_name))),
                ],
            )),
            _ => None,
        }
    }
}

//! Contentful Management API backend for cmsload.
//!
//! [`ContentfulStore`] implements [`cmsload_storage::ContentStore`] against
//! one environment of one space. Entries are read and written in the raw
//! locale-keyed shape; publishing, versioning and tag metadata follow the
//! Management API's rules.

mod store;
mod wire;

pub use store::{environment_url, ContentfulStore, MANAGEMENT_MEDIA_TYPE};

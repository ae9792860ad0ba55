//! Content store abstraction for cmsload.
//!
//! A [`ContentStore`] is the write target of every batch job: a headless CMS
//! environment holding locale-tagged entries, media assets and the content
//! model they follow. The crate also ships an in-process [`MemoryStore`] and
//! a backend-agnostic [`conformance`] suite.

mod asset;
pub mod conformance;
mod content_type;
mod error;
mod memory;
mod record;
mod traits;

pub use asset::{
    asset_link, upload_file, Asset, AssetPage, AssetSys, ASSET_FILE_FIELD, ASSET_TITLE_FIELD,
};
pub use content_type::{ContentTypeDef, FieldDef};
pub use error::StoreError;
pub use memory::{MemoryStore, WriteCounts};
pub use record::{
    asset_link_target, entry_link, fields_in, link_target, Entry, EntryPage, EntryQuery, EntryRef,
    EntrySys, Fields, LocalizedValue, Page, DEFAULT_PAGE_SIZE, DRAFT_FILTER, MAX_PAGE_SIZE,
    TAG_FILTER,
};
pub use traits::ContentStore;

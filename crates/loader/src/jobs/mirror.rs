//! Mirror tagged content from one environment into another.
//!
//! Entries carrying a tag, plus everything they reference up to a depth,
//! are copied by id: absent entries are created with the same id, entries
//! published more recently in the source are overwritten, the rest are left.
//!
//! Assets go first, so copied entries never point at a missing file. The
//! assets mirrored are those linked from the collected entries plus, when
//! an asset tag is given, every asset carrying it. A copied asset is
//! published when its source copy is.

use std::collections::{BTreeSet, VecDeque};

use cmsload_storage::{Asset, ContentStore, Entry, EntryQuery, StoreError, TAG_FILTER};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::index::{fetch_all, fetch_all_assets};
use crate::runlog::RunLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOptions {
    pub tag: String,
    /// Tag selecting extra assets to copy, beyond those entries link to.
    pub asset_tag: Option<String>,
    /// Link hops followed from each tagged entry.
    pub max_depth: usize,
    pub page_size: usize,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            tag: String::new(),
            asset_tag: None,
            max_depth: 4,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorAction {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorCounts {
    pub collected: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl MirrorCounts {
    fn collected(n: usize) -> Self {
        Self {
            collected: n,
            ..Self::default()
        }
    }

    /// Count one result and append its run log line.
    fn tally(
        &mut self,
        kind: &str,
        id: &str,
        result: Result<MirrorAction, StoreError>,
        log: &mut RunLog,
    ) {
        let line = match result {
            Ok(action) => {
                match action {
                    MirrorAction::Created => self.created += 1,
                    MirrorAction::Updated => self.updated += 1,
                    MirrorAction::Unchanged => self.unchanged += 1,
                }
                debug!("{} {}: {:?}", kind, id, action);
                format!("{} {} {}", action_verb(&action), kind, id)
            }
            Err(e) => {
                self.failed += 1;
                warn!("could not mirror {} {}: {}", kind, id, e);
                format!("failed {} {}: {}", kind, id, e)
            }
        };
        if let Err(e) = log.append(&line) {
            warn!("could not write run log {}: {}", log.path().display(), e);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub assets: MirrorCounts,
    pub entries: MirrorCounts,
}

/// Tagged entries of `source` and every entry linked from them within
/// `max_depth` hops, breadth first, each id once.
///
/// Links to entries that no longer exist are skipped; any other read
/// failure aborts the collection.
pub async fn collect_tagged<S>(source: &S, options: &MirrorOptions) -> Result<Vec<Entry>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let query = EntryQuery::default().with_filter(TAG_FILTER, &options.tag);
    let roots = fetch_all(source, &query, options.page_size).await?;

    let mut seen: BTreeSet<String> = roots.iter().map(|e| e.id().to_string()).collect();
    let mut queue: VecDeque<(Entry, usize)> = roots.into_iter().map(|e| (e, 0)).collect();
    let mut collected = Vec::new();

    while let Some((entry, depth)) = queue.pop_front() {
        if depth < options.max_depth {
            for id in entry.linked_entry_ids() {
                if !seen.insert(id.clone()) {
                    continue;
                }
                match source.get_entry(&id).await {
                    Ok(linked) => queue.push_back((linked, depth + 1)),
                    Err(e) if e.is_not_found() => {
                        warn!("{} links to missing entry {}", entry.id(), id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        collected.push(entry);
    }

    info!(
        "collected {} entries tagged '{}' (depth {})",
        collected.len(),
        options.tag,
        options.max_depth
    );
    Ok(collected)
}

/// Assets tagged with `options.asset_tag` plus every asset linked from
/// `entries`, each id once. Links to missing assets are skipped.
pub async fn collect_assets<S>(
    source: &S,
    entries: &[Entry],
    options: &MirrorOptions,
) -> Result<Vec<Asset>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let mut assets = match &options.asset_tag {
        Some(tag) => {
            let query = EntryQuery::default().with_filter(TAG_FILTER, tag);
            fetch_all_assets(source, &query, options.page_size).await?
        }
        None => Vec::new(),
    };
    let mut seen: BTreeSet<String> = assets.iter().map(|a| a.id().to_string()).collect();
    for entry in entries {
        for id in entry.linked_asset_ids() {
            if !seen.insert(id.clone()) {
                continue;
            }
            match source.get_asset(&id).await {
                Ok(asset) => assets.push(asset),
                Err(e) if e.is_not_found() => {
                    warn!("{} links to missing asset {}", entry.id(), id);
                }
                Err(e) => return Err(e),
            }
        }
    }
    info!("collected {} assets", assets.len());
    Ok(assets)
}

/// `true` when the source copy was published after the target copy.
///
/// A target that was never published is older than any published source.
pub fn is_newer(source: Option<&str>, target: Option<&str>) -> bool {
    match (source, target) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(s), Some(t)) => {
            match (
                OffsetDateTime::parse(s, &Rfc3339),
                OffsetDateTime::parse(t, &Rfc3339),
            ) {
                (Ok(s), Ok(t)) => s > t,
                _ => s > t,
            }
        }
    }
}

async fn mirror_one<T>(target: &T, entry: &Entry) -> Result<MirrorAction, StoreError>
where
    T: ContentStore + ?Sized,
{
    match target.get_entry(entry.id()).await {
        Ok(mut existing) => {
            if is_newer(
                entry.sys.published_at.as_deref(),
                existing.sys.published_at.as_deref(),
            ) {
                existing.fields = entry.fields.clone();
                target.update_entry(&existing).await?;
                Ok(MirrorAction::Updated)
            } else {
                Ok(MirrorAction::Unchanged)
            }
        }
        Err(e) if e.is_not_found() => {
            target
                .create_entry_with_id(entry.content_type(), entry.id(), entry.fields.clone())
                .await?;
            Ok(MirrorAction::Created)
        }
        Err(e) => Err(e),
    }
}

/// Copy `entries` into `target` by id.
///
/// Only `NotFound` leads to a create; any other lookup failure is counted
/// and the entry is left alone.
pub async fn mirror_entries<T>(target: &T, entries: &[Entry], log: &mut RunLog) -> MirrorCounts
where
    T: ContentStore + ?Sized,
{
    let mut counts = MirrorCounts::collected(entries.len());
    for entry in entries {
        let result = mirror_one(target, entry).await;
        counts.tally(entry.content_type(), entry.id(), result, log);
    }
    counts
}

async fn mirror_asset<T>(target: &T, asset: &Asset) -> Result<MirrorAction, StoreError>
where
    T: ContentStore + ?Sized,
{
    let action = match target.get_asset(asset.id()).await {
        Ok(mut existing) => {
            if !is_newer(
                asset.sys.published_at.as_deref(),
                existing.sys.published_at.as_deref(),
            ) {
                return Ok(MirrorAction::Unchanged);
            }
            existing.fields = asset.fields.clone();
            target.update_asset(&existing).await?;
            MirrorAction::Updated
        }
        Err(e) if e.is_not_found() => {
            target
                .create_asset_with_id(asset.id(), asset.fields.clone())
                .await?;
            MirrorAction::Created
        }
        Err(e) => return Err(e),
    };
    if asset.is_published() {
        let current = target.get_asset(asset.id()).await?;
        target.publish_asset(&current).await?;
    }
    Ok(action)
}

/// Copy `assets` into `target` by id, with the same rules as entries.
pub async fn mirror_assets<T>(target: &T, assets: &[Asset], log: &mut RunLog) -> MirrorCounts
where
    T: ContentStore + ?Sized,
{
    let mut counts = MirrorCounts::collected(assets.len());
    for asset in assets {
        let result = mirror_asset(target, asset).await;
        counts.tally("Asset", asset.id(), result, log);
    }
    counts
}

fn action_verb(action: &MirrorAction) -> &'static str {
    match action {
        MirrorAction::Created => "created",
        MirrorAction::Updated => "updated",
        MirrorAction::Unchanged => "unchanged",
    }
}

/// Collect from `source`, then mirror assets and entries into `target`.
pub async fn mirror<S, T>(
    source: &S,
    target: &T,
    options: &MirrorOptions,
    log: &mut RunLog,
) -> Result<MirrorReport, StoreError>
where
    S: ContentStore + ?Sized,
    T: ContentStore + ?Sized,
{
    let entries = collect_tagged(source, options).await?;
    let assets = collect_assets(source, &entries, options).await?;
    let assets = mirror_assets(target, &assets, log).await;
    let entries = mirror_entries(target, &entries, log).await;
    Ok(MirrorReport { assets, entries })
}

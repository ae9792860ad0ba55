use std::future::Future;

use serde_json::json;

use super::{Check, LOCALE};
use crate::asset::upload_file;
use crate::record::{fields_in, Fields};
use crate::{ContentStore, StoreError};

pub(super) async fn run_asset_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();

    checks.push(Check::new(
        "asset",
        "create_then_get",
        create_then_get(factory).await,
    ));
    checks.push(Check::new(
        "asset",
        "explicit_id_taken",
        explicit_id_taken(factory).await,
    ));
    checks.push(Check::new(
        "asset",
        "get_missing_asset",
        get_missing_asset(factory).await,
    ));
    checks.push(Check::new(
        "asset",
        "update_bumps_version",
        update_bumps_version(factory).await,
    ));
    checks.push(Check::new(
        "asset",
        "publish_unprocessed_rejected",
        publish_unprocessed_rejected(factory).await,
    ));

    checks
}

fn leaflet_fields(title: &str) -> Fields {
    fields_in(
        LOCALE,
        &[
            ("title", json!(title)),
            (
                "file",
                upload_file(
                    "application/pdf",
                    "leaflet.pdf",
                    "https://downloads.example.org/leaflet.pdf",
                ),
            ),
        ],
    )
}

async fn create_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_asset(leaflet_fields("Leaflet"))
        .await
        .map_err(|e| e.to_string())?;
    if created.is_published() {
        return Err("new asset is already published".into());
    }
    let fetched = s.get_asset(created.id()).await.map_err(|e| e.to_string())?;
    match fetched.title(LOCALE) {
        Some("Leaflet") => Ok(()),
        other => Err(format!("expected title Leaflet, got {:?}", other)),
    }
}

async fn explicit_id_taken<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_asset_with_id("leaflet-1", leaflet_fields("First"))
        .await
        .map_err(|e| e.to_string())?;
    match s
        .create_asset_with_id("leaflet-1", leaflet_fields("Second"))
        .await
    {
        Err(StoreError::AlreadyExists { .. }) => Ok(()),
        other => Err(format!("expected AlreadyExists, got {:?}", other)),
    }
}

async fn get_missing_asset<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_asset("no-such-asset").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn update_bumps_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut asset = s
        .create_asset(leaflet_fields("Draft"))
        .await
        .map_err(|e| e.to_string())?;
    let before = asset.sys.version;
    asset.fields = leaflet_fields("Renamed");
    let updated = s.update_asset(&asset).await.map_err(|e| e.to_string())?;
    if updated.sys.version <= before {
        return Err(format!(
            "version did not advance: {} -> {}",
            before, updated.sys.version
        ));
    }
    match s.update_asset(&asset).await {
        Err(StoreError::VersionMismatch { .. }) => Ok(()),
        other => Err(format!("stale update: expected VersionMismatch, got {:?}", other)),
    }
}

/// A file still pointing at its upload URL cannot be published.
async fn publish_unprocessed_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let asset = s
        .create_asset(leaflet_fields("Pending"))
        .await
        .map_err(|e| e.to_string())?;
    match s.publish_asset(&asset).await {
        Err(StoreError::Validation(_)) => Ok(()),
        other => Err(format!("expected Validation, got {:?}", other)),
    }
}

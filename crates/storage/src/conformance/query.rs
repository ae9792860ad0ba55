use std::collections::BTreeSet;
use std::future::Future;

use super::{create_many, Check, LOCALE};
use crate::{ContentStore, EntryQuery};

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();

    checks.push(Check::new(
        "query",
        "list_empty_type_returns_no_items",
        list_empty_type_returns_no_items(factory).await,
    ));
    checks.push(Check::new(
        "query",
        "list_filters_by_content_type",
        list_filters_by_content_type(factory).await,
    ));
    checks.push(Check::new(
        "query",
        "pages_cover_every_entry_once",
        pages_cover_every_entry_once(factory).await,
    ));
    checks.push(Check::new(
        "query",
        "total_counts_all_matches",
        total_counts_all_matches(factory).await,
    ));
    checks.push(Check::new(
        "query",
        "field_filter_selects_matching_entries",
        field_filter_selects_matching_entries(factory).await,
    ));
    checks.push(Check::new(
        "query",
        "draft_filter_excludes_published",
        draft_filter_excludes_published(factory).await,
    ));

    checks
}

async fn list_empty_type_returns_no_items<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let page = s
        .list_entries(&EntryQuery::for_type("pageCourse"))
        .await
        .map_err(|e| e.to_string())?;
    if !page.items.is_empty() || page.total != 0 {
        return Err(format!(
            "expected empty page, got {} items (total {})",
            page.items.len(),
            page.total
        ));
    }
    Ok(())
}

async fn list_filters_by_content_type<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    create_many(&s, "pageCourse", "page", 3).await?;
    create_many(&s, "dataCourse", "data", 2).await?;
    let page = s
        .list_entries(&EntryQuery::for_type("dataCourse"))
        .await
        .map_err(|e| e.to_string())?;
    if page.items.len() != 2 {
        return Err(format!("expected 2 dataCourse entries, got {}", page.items.len()));
    }
    if let Some(stray) = page.items.iter().find(|e| e.content_type() != "dataCourse") {
        return Err(format!("listing returned a {} entry", stray.content_type()));
    }
    Ok(())
}

/// Walking skip/limit pages yields every entry exactly once.
async fn pages_cover_every_entry_once<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    create_many(&s, "pageCourse", "course", 7).await?;

    let mut seen = BTreeSet::new();
    let mut skip = 0;
    loop {
        let page = s
            .list_entries(&EntryQuery::for_type("pageCourse").page(skip, 3))
            .await
            .map_err(|e| e.to_string())?;
        for item in &page.items {
            if !seen.insert(item.id().to_string()) {
                return Err(format!("entry {} returned on two pages", item.id()));
            }
        }
        if page.items.len() < 3 {
            break;
        }
        skip += 3;
    }
    if seen.len() != 7 {
        return Err(format!("expected 7 distinct entries, saw {}", seen.len()));
    }
    Ok(())
}

async fn total_counts_all_matches<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    create_many(&s, "pageCourse", "course", 5).await?;
    let page = s
        .list_entries(&EntryQuery::for_type("pageCourse").page(0, 2))
        .await
        .map_err(|e| e.to_string())?;
    if page.items.len() != 2 || page.total != 5 {
        return Err(format!(
            "expected 2 items of total 5, got {} of {}",
            page.items.len(),
            page.total
        ));
    }
    Ok(())
}

async fn field_filter_selects_matching_entries<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    create_many(&s, "pageCourse", "course", 4).await?;
    let page = s
        .list_entries(&EntryQuery::for_type("pageCourse").with_filter("fields.slug", "course-2"))
        .await
        .map_err(|e| e.to_string())?;
    match page.items.as_slice() {
        [only] if only.text("slug", LOCALE) == Some("course-2") => Ok(()),
        items => Err(format!("expected exactly course-2, got {} items", items.len())),
    }
}

async fn draft_filter_excludes_published<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    create_many(&s, "dataCourse", "data", 3).await?;
    let all = s
        .list_entries(&EntryQuery::for_type("dataCourse"))
        .await
        .map_err(|e| e.to_string())?;
    let first = all
        .items
        .first()
        .ok_or_else(|| "no entries listed".to_string())?;
    s.publish_entry(first).await.map_err(|e| e.to_string())?;

    let drafts = s
        .list_entries(&EntryQuery::for_type("dataCourse").drafts_only())
        .await
        .map_err(|e| e.to_string())?;
    if drafts.total != 2 {
        return Err(format!("expected 2 drafts, got {}", drafts.total));
    }
    if drafts.items.iter().any(|e| e.id() == first.id()) {
        return Err("published entry listed as draft".to_string());
    }
    Ok(())
}

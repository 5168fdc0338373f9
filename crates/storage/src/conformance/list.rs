use std::future::Future;

use super::{make_indexed_entry, TestResult};
use crate::{ListFilter, SchemaStorage};

pub(super) async fn run_list_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result("list", "empty_store_lists_nothing", empty_store_lists_nothing(factory).await),
        TestResult::from_result("list", "unfiltered_is_sorted", unfiltered_is_sorted(factory).await),
        TestResult::from_result("list", "filter_by_type", filter_by_type(factory).await),
        TestResult::from_result("list", "filter_by_all_tags", filter_by_all_tags(factory).await),
        TestResult::from_result("list", "filter_by_tenant", filter_by_tenant(factory).await),
        TestResult::from_result("list", "offset_and_limit", offset_and_limit(factory).await),
    ]
}

async fn seed<S: SchemaStorage>(s: &S) -> Result<(), String> {
    let entries = [
        make_indexed_entry("billing", "form", &["finance", "admin"], Some("acme")),
        make_indexed_entry("contact", "form", &["public"], None),
        make_indexed_entry("invoices", "table", &["finance"], Some("acme")),
        make_indexed_entry("onboarding", "wizard", &["admin"], Some("globex")),
    ];
    for entry in entries {
        let id = entry.id.clone();
        s.set(entry).await.map_err(|e| format!("seed {id}: {e}"))?;
    }
    Ok(())
}

async fn listed<S: SchemaStorage>(s: &S, filter: ListFilter) -> Result<Vec<String>, String> {
    s.list(&filter).await.map_err(|e| format!("list: {e}"))
}

async fn empty_store_lists_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ids = listed(&s, ListFilter::default()).await?;
    if !ids.is_empty() {
        return Err(format!("expected nothing, got {:?}", ids));
    }
    Ok(())
}

async fn unfiltered_is_sorted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s).await?;
    let ids = listed(&s, ListFilter::default()).await?;
    if ids != ["billing", "contact", "invoices", "onboarding"] {
        return Err(format!("unexpected listing {:?}", ids));
    }
    Ok(())
}

async fn filter_by_type<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s).await?;
    let ids = listed(
        &s,
        ListFilter {
            schema_type: Some("form".into()),
            ..ListFilter::default()
        },
    )
    .await?;
    if ids != ["billing", "contact"] {
        return Err(format!("expected [billing, contact], got {:?}", ids));
    }
    Ok(())
}

async fn filter_by_all_tags<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s).await?;
    let ids = listed(
        &s,
        ListFilter {
            tags: vec!["finance".into(), "admin".into()],
            ..ListFilter::default()
        },
    )
    .await?;
    if ids != ["billing"] {
        return Err(format!("expected [billing], got {:?}", ids));
    }
    Ok(())
}

async fn filter_by_tenant<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s).await?;
    let ids = listed(
        &s,
        ListFilter {
            tenant_id: Some("acme".into()),
            ..ListFilter::default()
        },
    )
    .await?;
    if ids != ["billing", "invoices"] {
        return Err(format!("expected [billing, invoices], got {:?}", ids));
    }
    Ok(())
}

async fn offset_and_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s).await?;
    let page = listed(
        &s,
        ListFilter {
            offset: 1,
            limit: 2,
            ..ListFilter::default()
        },
    )
    .await?;
    if page != ["contact", "invoices"] {
        return Err(format!("expected [contact, invoices], got {:?}", page));
    }
    let past_end = listed(
        &s,
        ListFilter {
            offset: 10,
            ..ListFilter::default()
        },
    )
    .await?;
    if !past_end.is_empty() {
        return Err(format!("offset past the end returned {:?}", past_end));
    }
    Ok(())
}

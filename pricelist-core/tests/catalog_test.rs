//! End-to-end catalog behaviour over a mock transport
//!
//! Workbooks are real xlsx bytes, so every test runs the actual normalizer.

mod common;

use common::{build_workbook, init_test_logging, sample_workbook, MockTransport, WORKBOOK_URL};
use pretty_assertions::assert_eq;
use pricelist_core::cache::ManualClock;
use pricelist_core::fetch::HttpResponse;
use pricelist_core::{
    Catalog, CatalogConfig, CatalogError, CellValue, ColumnRole, Row, SearchQuery,
};
use std::sync::Arc;
use std::time::Duration;

fn config() -> CatalogConfig {
    CatalogConfig {
        cache_ttl_seconds: 600,
        ..CatalogConfig::for_url(WORKBOOK_URL)
    }
}

fn catalog_over(transport: Arc<MockTransport>) -> (Catalog, Arc<ManualClock>) {
    init_test_logging();
    let clock = Arc::new(ManualClock::new());
    let catalog = Catalog::with_transport(config(), transport, clock.clone()).unwrap();
    (catalog, clock)
}

#[tokio::test]
async fn test_lists_categories_in_workbook_order_without_empty_sheets() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    let categories = catalog.list_categories().await.unwrap();

    assert_eq!(categories, vec!["Cable", "Pump"]);
}

#[tokio::test]
async fn test_global_search_tags_rows_with_category() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    let result = catalog
        .run_search(&SearchQuery::everywhere("cat"))
        .await
        .unwrap();

    let expected: Row = [
        ("Category", CellValue::from("Cable")),
        ("Title", CellValue::from("Cat 6")),
        ("ASIN", CellValue::from("A1")),
        ("SKU", CellValue::Number(6.0)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    assert_eq!(result.count(), 1);
    assert_eq!(result.rows, vec![expected]);
    assert_eq!(
        result.columns,
        vec!["Category", "Title", "ASIN", "SKU", "PRODUCT Gallery"]
    );
}

#[tokio::test]
async fn test_global_empty_query_returns_every_row() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    let snapshot = catalog.snapshot().await.unwrap();
    let result = catalog
        .run_search(&SearchQuery::everywhere(""))
        .await
        .unwrap();

    assert_eq!(result.count(), snapshot.total_rows());
}

#[tokio::test]
async fn test_category_search_matches_numbers_as_text() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    let result = catalog
        .run_search(&SearchQuery::in_category("6", "Cable"))
        .await
        .unwrap();
    assert_eq!(result.count(), 1);
    assert_eq!(result.columns, vec!["Title", "ASIN", "SKU"]);

    let result = catalog
        .run_search(&SearchQuery::in_category("pump", "Cable"))
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_unknown_category_is_not_found() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    assert_eq!(
        catalog.get_category("Notes").await.unwrap_err(),
        CatalogError::NotFound("Notes".into())
    );
    assert!(matches!(
        catalog.get_column_roles("Adapter").await,
        Err(CatalogError::NotFound(_))
    ));
    assert!(matches!(
        catalog
            .run_search(&SearchQuery::in_category("", "Adapter"))
            .await,
        Err(CatalogError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_get_category_and_roles() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    let pump = catalog.get_category("Pump").await.unwrap();
    assert_eq!(pump.rows.len(), 1);

    let roles = catalog.get_column_roles("Pump").await.unwrap();
    assert_eq!(roles["Title"], ColumnRole::Identifier);
    assert_eq!(roles["ASIN"], ColumnRole::Identifier);
    assert_eq!(roles["PRODUCT Gallery"], ColumnRole::Hyperlink);
}

#[tokio::test]
async fn test_find_categories_filters_names() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport);

    assert_eq!(catalog.find_categories("PU").await.unwrap(), vec!["Pump"]);
    assert_eq!(
        catalog.find_categories("").await.unwrap(),
        vec!["Cable", "Pump"]
    );
    assert!(catalog.find_categories("router").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cache_serves_repeat_requests_within_ttl() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, clock) = catalog_over(transport.clone());

    catalog.list_categories().await.unwrap();
    clock.advance(Duration::from_secs(599));
    catalog.get_category("Cable").await.unwrap();
    catalog
        .run_search(&SearchQuery::everywhere("pump"))
        .await
        .unwrap();

    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_expired_snapshot_is_replaced_wholesale() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, clock) = catalog_over(transport.clone());

    let before = catalog.snapshot().await.unwrap();

    transport.set_body(build_workbook(vec![(
        "Adapter",
        vec![
            vec!["banner".into()],
            vec!["Title".into()],
            vec!["USB-C".into()],
        ],
    )]));
    clock.advance(Duration::from_secs(600));

    let after = catalog.snapshot().await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(after.category_names(), vec!["Adapter"]);
    // the old snapshot is untouched
    assert_eq!(before.category_names(), vec!["Cable", "Pump"]);
}

#[tokio::test]
async fn test_refresh_forces_refetch() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, _clock) = catalog_over(transport.clone());

    catalog.list_categories().await.unwrap();
    catalog.refresh();
    catalog.list_categories().await.unwrap();

    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_during_slow_fetch_forces_new_fetch() {
    let transport = Arc::new(
        MockTransport::serving(sample_workbook()).with_delay(Duration::from_millis(200)),
    );
    init_test_logging();
    let catalog = Arc::new(
        Catalog::with_transport(
            config(),
            transport.clone(),
            Arc::new(pricelist_core::cache::SystemClock),
        )
        .unwrap(),
    );

    let early = {
        let catalog = Arc::clone(&catalog);
        tokio::spawn(async move { catalog.list_categories().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    catalog.refresh();
    catalog.list_categories().await.unwrap();
    assert_eq!(early.await.unwrap().unwrap(), vec!["Cable", "Pump"]);
    assert_eq!(transport.calls(), 2);

    // the post-refresh result is the one kept
    catalog.list_categories().await.unwrap();
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_failed_refresh_keeps_last_good_snapshot() {
    let transport = Arc::new(MockTransport::serving(sample_workbook()));
    let (catalog, clock) = catalog_over(transport.clone());

    catalog.list_categories().await.unwrap();
    clock.advance(Duration::from_secs(601));
    transport.push(Ok(HttpResponse::status(404)));

    let err = catalog.list_categories().await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Transport {
            status: Some(404),
            ..
        }
    ));

    let stale = catalog.cached_snapshot().expect("last good snapshot");
    assert_eq!(stale.category_names(), vec!["Cable", "Pump"]);
}

#[tokio::test]
async fn test_authorization_failure_surfaces_without_retry() {
    let transport = Arc::new(
        MockTransport::serving(sample_workbook())
            .with_script(vec![Ok(HttpResponse::status(401))]),
    );
    let (catalog, _clock) = catalog_over(transport.clone());

    let err = catalog.list_categories().await.unwrap_err();

    assert!(matches!(err, CatalogError::Authorization { status: 401, .. }));
    assert_eq!(transport.calls(), 1);
    assert!(catalog.cached_snapshot().is_none());
}

#[tokio::test]
async fn test_unparseable_and_empty_workbooks_are_errors() {
    let transport = Arc::new(MockTransport::serving(b"<html>Sign in</html>".to_vec()));
    let (catalog, _clock) = catalog_over(transport.clone());

    assert!(matches!(
        catalog.list_categories().await,
        Err(CatalogError::Format(_))
    ));

    transport.set_body(build_workbook(vec![(
        "Notes",
        vec![vec!["banner".into()], vec!["Title".into()]],
    )]));
    catalog.refresh();

    assert_eq!(
        catalog.list_categories().await.unwrap_err(),
        CatalogError::EmptyWorkbook
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_fetch_once() {
    let transport = Arc::new(
        MockTransport::serving(sample_workbook()).with_delay(Duration::from_millis(200)),
    );
    init_test_logging();
    let catalog = Arc::new(
        Catalog::with_transport(
            config(),
            transport.clone(),
            Arc::new(pricelist_core::cache::SystemClock),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move {
                if i % 2 == 0 {
                    catalog.list_categories().await.map(|c| c.len())
                } else {
                    catalog
                        .run_search(&SearchQuery::everywhere(""))
                        .await
                        .map(|r| r.count())
                }
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 2);
    }
    assert_eq!(transport.calls(), 1);
}

#[test]
fn test_invalid_config_is_rejected_at_construction() {
    let transport = Arc::new(MockTransport::serving(Vec::new()));
    let result = Catalog::with_transport(
        CatalogConfig::default(),
        transport,
        Arc::new(ManualClock::new()),
    );
    assert!(matches!(result, Err(CatalogError::Config(_))));
}

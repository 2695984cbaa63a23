use super::*;
use repack_watcher::store::JsonFileStore;
use serde_json::json;

fn write_items(path: &std::path::Path, items: serde_json::Value) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(&items)?)?;
    Ok(())
}

fn read_items(path: &std::path::Path) -> anyhow::Result<Vec<TrackedItem>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[tokio::test]
async fn test_json_store_persists_run_outcomes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tracked_items.json");
    write_items(
        &path,
        json!([
            {
                "id": 1,
                "user_id": 4242,
                "product_name": "Echo Dot",
                "item_id": "B08N5WRWNW",
                "marketplace": "it",
                "price_paid": "59.90",
                "min_savings_threshold": "5.00",
                "return_deadline": "2031-03-01"
            },
            {
                "id": 2,
                "user_id": 4243,
                "item_id": "B07XJ8C8F5",
                "marketplace": "it",
                "price_paid": "120.00",
                "consecutive_failures": 2,
                "return_deadline": "2031-03-01"
            }
        ]),
    )?;

    let storefront = StubStorefront::default();
    storefront.set_price("B08N5WRWNW", "53,00 €");
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(Arc::new(JsonFileStore::new(&path)), &storefront, inbox.clone());

    let summary = checker.run().await;
    assert_eq!(summary.price_drops, 1);
    assert_eq!(summary.unavailable, 1);
    assert_eq!(summary.errors, 0);
    println!("✓ Run completed against JSON store");

    let items = read_items(&path)?;
    assert_eq!(items[0].last_notified_price, Some(dec("53.00")));
    assert_eq!(items[0].consecutive_failures, 0);
    assert_eq!(items[1].consecutive_failures, 3);
    assert_eq!(items[1].last_notified_price, None);
    assert!(inbox.messages_for(4243)[0].contains("ASIN B07XJ8C8F5"));
    println!("✓ Outcomes persisted to disk");

    Ok(())
}

#[tokio::test]
async fn test_missing_store_file_is_an_empty_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let storefront = StubStorefront::default();
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(
        Arc::new(JsonFileStore::new(dir.path().join("absent.json"))),
        &storefront,
        inbox,
    );

    let summary = checker.run().await;

    assert_eq!(summary.total_items, 0);
    assert_eq!(summary.errors, 0);
    assert_eq!(storefront.sessions(), (0, 0));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_store_file_aborts_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tracked_items.json");
    std::fs::write(&path, "{ not json")?;

    let storefront = StubStorefront::default();
    let checker = test_checker(Arc::new(JsonFileStore::new(&path)), &storefront, Arc::new(Inbox::default()));

    let summary = checker.run().await;

    assert_eq!(summary.errors, 1);
    assert_eq!(storefront.sessions(), (0, 0));
    // The broken file is left for the operator to inspect
    assert_eq!(std::fs::read_to_string(&path)?, "{ not json");
    Ok(())
}

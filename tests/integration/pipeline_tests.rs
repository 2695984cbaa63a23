use super::*;
use repack_watcher::models::RunSummary;
use repack_watcher::store::MemoryStore;

#[tokio::test]
async fn test_price_drop_lifecycle_across_runs() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new([tracked_item(1, 700, "B08N5WRWNW", "59.90", Some("5.00"))]));
    let storefront = StubStorefront::default();
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(store.clone(), &storefront, inbox.clone());

    // Savings below the threshold stay silent
    storefront.set_price("B08N5WRWNW", "56,00 €");
    let summary = checker.run().await;
    assert_eq!(summary.price_drops, 0);
    assert!(inbox.messages().is_empty());
    println!("✓ Below-threshold drop ignored");

    // First qualifying drop is delivered and recorded
    storefront.set_price("B08N5WRWNW", "53,00 €");
    let summary = checker.run().await;
    assert_eq!(summary.price_drops, 1);
    assert_eq!(summary.notifications_sent, 1);
    assert_eq!(store.get(1).await.unwrap().last_notified_price, Some(dec("53.00")));
    assert!(inbox.messages_for(700)[0].contains("Savings: <b>€6.90</b>"));
    println!("✓ First drop notified");

    // Same price again: hysteresis keeps it quiet
    let summary = checker.run().await;
    assert_eq!(summary.price_drops, 0);
    assert_eq!(inbox.messages().len(), 1);
    println!("✓ Repeat price suppressed");

    // Price rises then falls back above the last notified floor
    storefront.set_price("B08N5WRWNW", "54,50 €");
    assert_eq!(checker.run().await.price_drops, 0);
    println!("✓ Rebound above floor suppressed");

    // A new low beats the floor
    storefront.set_price("B08N5WRWNW", "50,00 €");
    let summary = checker.run().await;
    assert_eq!(summary.price_drops, 1);
    assert_eq!(store.get(1).await.unwrap().last_notified_price, Some(dec("50.00")));
    assert!(inbox.messages_for(700)[1].contains("Savings: <b>€9.90</b>"));
    println!("✓ New low notified");

    Ok(())
}

#[tokio::test]
async fn test_unavailable_notice_fires_once_per_streak() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new([tracked_item(1, 701, "B07XJ8C8F5", "120.00", None)]));
    let storefront = StubStorefront::default();
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(store.clone(), &storefront, inbox.clone());

    let mut unavailable = Vec::new();
    for _ in 0..4 {
        unavailable.push(checker.run().await.unavailable);
    }
    assert_eq!(unavailable, vec![0, 0, 1, 0]);
    assert_eq!(store.get(1).await.unwrap().consecutive_failures, 4);
    assert_eq!(inbox.messages_for(701).len(), 1);
    assert!(inbox.messages_for(701)[0].contains("3 consecutive checks"));
    println!("✓ Single unavailable notice after three failures");

    // Price comes back: counter resets and a new streak can notify again
    storefront.set_price("B07XJ8C8F5", "125,00 €");
    let summary = checker.run().await;
    assert_eq!(summary.fetched, 1);
    assert_eq!(store.get(1).await.unwrap().consecutive_failures, 0);

    storefront.remove_price("B07XJ8C8F5");
    let mut unavailable = Vec::new();
    for _ in 0..3 {
        unavailable.push(checker.run().await.unavailable);
    }
    assert_eq!(unavailable, vec![0, 0, 1]);
    assert_eq!(inbox.messages_for(701).len(), 2);
    println!("✓ Streak reset after recovery");

    Ok(())
}

#[tokio::test]
async fn test_shared_item_is_fetched_once_per_run() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new([
        tracked_item(1, 800, "B08N5WRWNW", "59.90", None),
        tracked_item(2, 801, "B08N5WRWNW", "64.90", Some("20.00")),
        tracked_item(3, 802, "B0BSHF7WHW", "19.99", None),
    ]));
    let storefront = StubStorefront::default();
    storefront.set_price("B08N5WRWNW", "49,99 €");
    storefront.set_price("B0BSHF7WHW", "1.234,56 €");
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(store.clone(), &storefront, inbox.clone());

    let summary = checker.run().await;

    assert_eq!(
        summary,
        RunSummary {
            total_items: 3,
            fetched: 3,
            price_drops: 1,
            unavailable: 0,
            notifications_sent: 1,
            delivery_failures: 0,
            errors: 0,
        }
    );
    assert_eq!(storefront.navigations().len(), 2);
    assert_eq!(storefront.sessions(), (1, 1));
    assert_eq!(inbox.messages_for(800).len(), 1);
    // 64.90 - 49.99 = 14.91 stays under the 20.00 threshold
    assert!(inbox.messages_for(801).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_blocked_recipient_does_not_affect_others() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new([
        tracked_item(1, 900, "B08N5WRWNW", "59.90", None),
        tracked_item(2, 901, "B07XJ8C8F5", "30.00", None),
    ]));
    let storefront = StubStorefront::default();
    storefront.set_price("B08N5WRWNW", "39,90 €");
    storefront.set_price("B07XJ8C8F5", "25,00 €");
    let inbox = Arc::new(Inbox::default());
    inbox.block(900);
    let checker = test_checker(store.clone(), &storefront, inbox.clone());

    let summary = checker.run().await;

    assert_eq!(summary.price_drops, 2);
    assert_eq!(summary.notifications_sent, 1);
    assert_eq!(summary.delivery_failures, 1);
    assert!(!summary.is_clean());
    assert_eq!(store.get(1).await.unwrap().last_notified_price, None);
    assert_eq!(store.get(2).await.unwrap().last_notified_price, Some(dec("25.00")));

    // The undelivered drop is retried on the next run
    let retry = checker.run().await;
    assert_eq!(retry.price_drops, 1);

    Ok(())
}

#[tokio::test]
async fn test_invalid_item_is_skipped_and_counted() -> anyhow::Result<()> {
    let mut broken = tracked_item(2, 951, "B07XJ8C8F5", "10.00", Some("15.00"));
    broken.product_name = None;
    let store = Arc::new(MemoryStore::new([
        tracked_item(1, 950, "B08N5WRWNW", "59.90", None),
        broken,
    ]));
    let storefront = StubStorefront::default();
    storefront.set_price("B08N5WRWNW", "50,00 €");
    storefront.set_price("B07XJ8C8F5", "1,00 €");
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(store.clone(), &storefront, inbox.clone());

    let summary = checker.run().await;

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.price_drops, 1);
    assert!(inbox.messages_for(951).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_items_past_return_deadline_are_skipped() -> anyhow::Result<()> {
    let mut expired = tracked_item(1, 705, "B08N5WRWNW", "59.90", None);
    expired.return_deadline = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let store = Arc::new(MemoryStore::new([
        expired,
        tracked_item(2, 706, "B07XJ8C8F5", "30.00", None),
    ]));
    let storefront = StubStorefront::default();
    storefront.set_price("B08N5WRWNW", "40,00 €");
    storefront.set_price("B07XJ8C8F5", "30,00 €");
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(store.clone(), &storefront, inbox.clone());

    let summary = checker.run().await;

    assert_eq!(summary.total_items, 1);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.price_drops, 0);
    assert_eq!(summary.notifications_sent, 0);
    assert!(storefront.navigations().iter().all(|url| !url.contains("B08N5WRWNW")));
    assert!(inbox.messages_for(705).is_empty());
    assert_eq!(store.get(1).await.unwrap().last_notified_price, None);

    Ok(())
}

#[tokio::test]
async fn test_only_expired_items_never_open_browser() -> anyhow::Result<()> {
    let mut expired = tracked_item(1, 707, "B08N5WRWNW", "59.90", None);
    expired.return_deadline = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let store = Arc::new(MemoryStore::new([expired]));
    let storefront = StubStorefront::default();
    storefront.set_price("B08N5WRWNW", "40,00 €");
    let inbox = Arc::new(Inbox::default());
    let checker = test_checker(store, &storefront, inbox.clone());

    assert_eq!(checker.run().await, RunSummary::default());
    assert!(storefront.navigations().is_empty());
    assert_eq!(storefront.sessions(), (0, 0));
    assert!(inbox.messages().is_empty());

    Ok(())
}

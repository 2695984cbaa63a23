//! Batch price acquisition over one shared browser session.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::extractor::PriceExtractor;
use crate::marketplace::MarketplaceCatalog;
use crate::models::{ItemKey, TrackedItem};
use crate::scraper::{BrowserSession, SessionLauncher};
use crate::utils::error::FetchError;

/// Current price per tracking record id; absent ids had no usable price.
pub type FetchResults = HashMap<i64, Decimal>;

pub struct PriceFetcher {
    launcher: Arc<dyn SessionLauncher>,
    extractor: PriceExtractor,
    catalog: MarketplaceCatalog,
    selector_timeout: Duration,
}

impl PriceFetcher {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        extractor: PriceExtractor,
        catalog: MarketplaceCatalog,
        selector_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            extractor,
            catalog,
            selector_timeout,
        }
    }

    /// Fetches each distinct `(item id, marketplace)` once and maps the price
    /// onto every record sharing it.
    ///
    /// Lookups run one after another with `pace` between them. Only a failure
    /// to open the session is returned as an error; per-lookup failures leave
    /// the affected records out of the result.
    pub async fn fetch_prices(
        &self,
        items: &[TrackedItem],
        pace: Duration,
    ) -> Result<FetchResults, FetchError> {
        let groups = group_by_key(items);
        info!(
            "Fetching {} unique items for {} tracked records (deduplication saved {} lookups)",
            groups.len(),
            items.len(),
            items.len() - groups.len()
        );

        if groups.is_empty() {
            return Ok(FetchResults::new());
        }

        let mut session = self.launcher.open_session().await?;
        let results = self.fetch_groups(session.as_mut(), &groups, pace).await;
        session.close().await;

        info!("Fetched {}/{} records successfully", results.len(), items.len());
        Ok(results)
    }

    async fn fetch_groups(
        &self,
        session: &mut dyn BrowserSession,
        groups: &BTreeMap<ItemKey, Vec<i64>>,
        pace: Duration,
    ) -> FetchResults {
        let mut results = FetchResults::new();

        for (index, (key, ids)) in groups.iter().enumerate() {
            if index > 0 && !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }

            match self.fetch_one(session, key).await {
                Ok(Some(price)) => {
                    counter!("repack_prices_fetched_total").increment(1);
                    debug!("{} ({}) mapped to {} record(s)", key, price, ids.len());
                    for id in ids {
                        results.insert(*id, price);
                    }
                }
                Ok(None) => {
                    counter!("repack_price_fetch_failures_total").increment(1);
                    warn!("No price found for {}", key);
                }
                Err(e) => {
                    counter!("repack_price_fetch_failures_total").increment(1);
                    warn!("Price lookup for {} failed: {}", key, e);
                }
            }
        }

        results
    }

    async fn fetch_one(
        &self,
        session: &mut dyn BrowserSession,
        key: &ItemKey,
    ) -> Result<Option<Decimal>, FetchError> {
        let url = self.catalog.product_url(&key.item_id, &key.marketplace);
        let mut page = session
            .new_page(self.catalog.accept_language(&key.marketplace))
            .await?;

        let outcome = async {
            page.navigate(&url).await?;

            // The page may still carry a price under a locator that rendered late
            if let Err(e) = page
                .wait_for_selector(&self.extractor.wait_selector(), self.selector_timeout)
                .await
            {
                debug!("{} for {}", e, key);
            }

            let html = page.content().await?;
            Ok::<_, FetchError>(self.extractor.extract(&html))
        }
        .await;

        page.close().await;
        outcome
    }

    /// Single lookup for diagnostics.
    pub async fn fetch_one_price(&self, item_id: &str, marketplace: &str) -> Result<Option<Decimal>, FetchError> {
        let key = ItemKey::new(item_id, marketplace);
        let mut session = self.launcher.open_session().await?;
        let outcome = self.fetch_one(session.as_mut(), &key).await;
        session.close().await;
        outcome
    }
}

/// Groups record ids by lookup key; `BTreeMap` keeps the fetch order stable.
pub fn group_by_key(items: &[TrackedItem]) -> BTreeMap<ItemKey, Vec<i64>> {
    let mut groups: BTreeMap<ItemKey, Vec<i64>> = BTreeMap::new();
    for item in items {
        groups.entry(item.key()).or_default().push(item.id);
    }
    groups
}

//! One fetch, decide and dispatch run over every tracked item.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::decision::DecisionEngine;
use crate::dispatcher::{DispatchSettings, Dispatcher};
use crate::extractor::PriceExtractor;
use crate::marketplace::MarketplaceCatalog;
use crate::messages::MessageFormatter;
use crate::models::{RunSummary, TrackedItem};
use crate::plugins::notifiers::{OpsWebhook, TelegramChannel};
use crate::price_fetcher::PriceFetcher;
use crate::scraper::ChromeLauncher;
use crate::store::TrackedItemStore;
use crate::utils::error::Result;

pub struct PriceChecker {
    store: Arc<dyn TrackedItemStore>,
    fetcher: PriceFetcher,
    engine: DecisionEngine,
    dispatcher: Dispatcher,
    ops: Option<OpsWebhook>,
    pace: Duration,
}

impl PriceChecker {
    pub fn new(
        store: Arc<dyn TrackedItemStore>,
        fetcher: PriceFetcher,
        dispatcher: Dispatcher,
        pace: Duration,
    ) -> Self {
        Self {
            engine: DecisionEngine::new(store.clone()),
            store,
            fetcher,
            dispatcher,
            ops: None,
            pace,
        }
    }

    pub fn with_ops_webhook(mut self, ops: Option<OpsWebhook>) -> Self {
        self.ops = ops;
        self
    }

    /// Wires headless Chrome, Telegram and the optional ops webhook from
    /// configuration.
    pub fn from_config(config: &AppConfig, store: Arc<dyn TrackedItemStore>) -> Result<Self> {
        let catalog = MarketplaceCatalog::from_config(&config.marketplaces);
        let fetcher = PriceFetcher::new(
            Arc::new(ChromeLauncher::from_config(&config.scraper)),
            PriceExtractor::new(&config.scraper.price_selectors)?,
            catalog.clone(),
            config.scraper.selector_timeout(),
        );
        let dispatcher = Dispatcher::new(
            Arc::new(TelegramChannel::new(&config.telegram)?),
            MessageFormatter::new(catalog),
            DispatchSettings::from(&config.notifications),
        );

        Ok(Self::new(store, fetcher, dispatcher, config.scraper.pace())
            .with_ops_webhook(OpsWebhook::from_config(&config.ops)))
    }

    /// Runs the pipeline once. Never fails; problems end up in the summary.
    pub async fn run(&self) -> RunSummary {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("price_check", run_id = %run_id);

        async {
            info!("Starting price check");
            let started = Instant::now();
            let summary = self.execute().await;
            let elapsed = started.elapsed();

            counter!("repack_runs_total").increment(1);
            histogram!("repack_run_duration_seconds").record(elapsed.as_secs_f64());
            info!(
                "Price check finished in {:.1}s: {} items, {} priced, {} drops, {} unavailable, {} sent, {} failed, {} errors",
                elapsed.as_secs_f64(),
                summary.total_items,
                summary.fetched,
                summary.price_drops,
                summary.unavailable,
                summary.notifications_sent,
                summary.delivery_failures,
                summary.errors
            );

            if let Some(ops) = &self.ops {
                ops.report(&run_id, &summary).await;
            }
            summary
        }
        .instrument(span)
        .await
    }

    async fn execute(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        let items = match self.store.get_tracked_items().await {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to load tracked items: {}", e);
                summary.errors += 1;
                return summary;
            }
        };

        let (items, expired) = drop_expired(items, Utc::now().date_naive());
        if expired > 0 {
            info!("Skipping {} tracked items past their return deadline", expired);
        }
        summary.total_items = items.len();

        if items.is_empty() {
            info!("No tracked items to check");
            return summary;
        }

        // A launch failure says nothing about individual items, so counters stay untouched
        let prices = match self.fetcher.fetch_prices(&items, self.pace).await {
            Ok(prices) => prices,
            Err(e) => {
                error!("Aborting run, browser session unavailable: {}", e);
                summary.errors += 1;
                return summary;
            }
        };

        let outcome = self.engine.process(&items, &prices).await;
        summary.fetched = outcome.summary.fetched;
        summary.price_drops = outcome.summary.price_drops;
        summary.unavailable = outcome.summary.unavailable;
        summary.errors += outcome.summary.errors;

        let report = self.dispatcher.dispatch(&outcome.events).await;
        summary.notifications_sent = report.sent;
        summary.delivery_failures = report.failed;

        for delivered in report.delivered_drops {
            match self.store.record_notified_price(delivered.tracking_id, delivered.price).await {
                Ok(()) => counter!("repack_savings_generated_cents").increment(delivered.savings_cents()),
                Err(e) => {
                    warn!(
                        item = delivered.tracking_id,
                        "Failed to record notified price {}: {}", delivered.price, e
                    );
                    summary.errors += 1;
                }
            }
        }

        summary
    }
}

/// Removes items whose return window closed before `today`.
/// Items due today are still checked.
fn drop_expired(items: Vec<TrackedItem>, today: NaiveDate) -> (Vec<TrackedItem>, usize) {
    let total = items.len();
    let active: Vec<TrackedItem> = items
        .into_iter()
        .filter(|item| item.return_deadline >= today)
        .collect();
    let expired = total - active.len();
    (active, expired)
}

//! Per-item notification decisions: price-drop hysteresis and the
//! unavailable-after-three-failures rule.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::models::{NotificationEvent, TrackedItem};
use crate::price_fetcher::FetchResults;
use crate::store::TrackedItemStore;

/// Failure streak length that triggers the single unavailable notice.
pub const UNAVAILABLE_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceVerdict {
    Drop { savings: Decimal },
    NotBelowPaid,
    BelowThreshold { savings: Decimal },
    NotBelowLastNotified { last_notified: Decimal },
}

/// Applies the exclusions in order: paid price, savings threshold, then the
/// last price already reported.
pub fn evaluate_price(item: &TrackedItem, current_price: Decimal) -> PriceVerdict {
    if current_price >= item.price_paid {
        return PriceVerdict::NotBelowPaid;
    }

    let savings = item.price_paid - current_price;
    if savings < item.threshold() {
        return PriceVerdict::BelowThreshold { savings };
    }

    if let Some(last_notified) = item.last_notified_price {
        if current_price >= last_notified {
            return PriceVerdict::NotBelowLastNotified { last_notified };
        }
    }

    PriceVerdict::Drop { savings }
}

/// True only on the exact transition into the streak threshold.
pub fn crosses_unavailable_threshold(failures: u32) -> bool {
    failures == UNAVAILABLE_AFTER_FAILURES
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionSummary {
    pub total_items: usize,
    pub fetched: usize,
    pub price_drops: usize,
    pub unavailable: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionOutcome {
    pub events: Vec<NotificationEvent>,
    pub summary: DecisionSummary,
}

pub struct DecisionEngine {
    store: Arc<dyn TrackedItemStore>,
}

impl DecisionEngine {
    pub fn new(store: Arc<dyn TrackedItemStore>) -> Self {
        Self { store }
    }

    /// Updates failure counters through the store and collects events.
    ///
    /// Nothing here aborts the batch: invalid items and store failures are
    /// counted as errors and processing moves on.
    pub async fn process(&self, items: &[TrackedItem], prices: &FetchResults) -> DecisionOutcome {
        let mut outcome = DecisionOutcome::default();
        outcome.summary.total_items = items.len();

        for item in items {
            if let Err(e) = item.validate() {
                warn!(item = item.id, "Skipping tracked item with invalid data: {}", e);
                outcome.summary.errors += 1;
                continue;
            }

            match prices.get(&item.id) {
                Some(price) => self.on_price(item, *price, &mut outcome).await,
                None => self.on_missing_price(item, &mut outcome).await,
            }
        }

        let summary = &outcome.summary;
        info!(
            "Decisions: {} items, {} priced, {} price drops, {} unavailable, {} errors",
            summary.total_items, summary.fetched, summary.price_drops, summary.unavailable, summary.errors
        );
        outcome
    }

    async fn on_price(&self, item: &TrackedItem, price: Decimal, outcome: &mut DecisionOutcome) {
        outcome.summary.fetched += 1;

        if item.consecutive_failures > 0 {
            if let Err(e) = self.store.reset_failure_count(item.id).await {
                warn!(item = item.id, "Failed to reset failure count: {}", e);
                outcome.summary.errors += 1;
            }
        }

        match evaluate_price(item, price) {
            PriceVerdict::Drop { savings } => {
                info!(
                    item = item.id,
                    "Price drop for {}: {} -> {} (saving {})",
                    item.item_id, item.price_paid, price, savings
                );
                outcome.events.push(NotificationEvent::price_drop(item, price, savings));
                outcome.summary.price_drops += 1;
            }
            verdict => debug!(item = item.id, "No notification at {}: {:?}", price, verdict),
        }
    }

    async fn on_missing_price(&self, item: &TrackedItem, outcome: &mut DecisionOutcome) {
        match self.store.increment_failure_count(item.id).await {
            Ok(failures) => {
                debug!(item = item.id, "No price, failure streak now {}", failures);
                if crosses_unavailable_threshold(failures) {
                    warn!(
                        item = item.id,
                        "{} unavailable after {} consecutive failures", item.item_id, failures
                    );
                    outcome.events.push(NotificationEvent::unavailable(item, failures));
                    outcome.summary.unavailable += 1;
                }
            }
            Err(e) => {
                warn!(item = item.id, "Failed to increment failure count: {}", e);
                outcome.summary.errors += 1;
            }
        }
    }
}

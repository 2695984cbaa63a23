//! Rate-limited batch delivery of notification events.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::NotificationsConfig;
use crate::messages::MessageFormatter;
use crate::models::NotificationEvent;
use crate::plugins::traits::MessageChannel;
use crate::utils::retry::{RetryPolicy, send_message_with_retry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
}

impl From<&NotificationsConfig> for DispatchSettings {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay(),
            max_concurrent: config.max_concurrent,
            retry: config.retry_policy(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&NotificationsConfig::default())
    }
}

/// A price drop that reached its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredDrop {
    pub tracking_id: i64,
    pub price: Decimal,
    pub savings: Decimal,
}

impl DeliveredDrop {
    /// Savings in whole cents, for integer counters.
    pub fn savings_cents(&self) -> u64 {
        (self.savings * Decimal::ONE_HUNDRED).round().to_u64().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub delivered_drops: Vec<DeliveredDrop>,
}

pub struct Dispatcher {
    channel: Arc<dyn MessageChannel>,
    formatter: MessageFormatter,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn MessageChannel>, formatter: MessageFormatter, settings: DispatchSettings) -> Self {
        Self {
            channel,
            formatter,
            settings,
        }
    }

    /// Delivers all price drops, then all unavailable notices.
    ///
    /// Deliveries inside a batch run concurrently; consecutive batches of one
    /// pass are separated by the configured delay. Never fails.
    pub async fn dispatch(&self, events: &[NotificationEvent]) -> DispatchReport {
        let (drops, unavailable): (Vec<&NotificationEvent>, Vec<&NotificationEvent>) = events
            .iter()
            .partition(|event| matches!(event, NotificationEvent::PriceDrop(_)));

        let mut report = DispatchReport::default();
        self.run_pass("price drop", &drops, &mut report).await;
        self.run_pass("unavailable", &unavailable, &mut report).await;

        info!(
            "Dispatch finished via {}: {} sent, {} failed",
            self.channel.name(),
            report.sent,
            report.failed
        );
        report
    }

    async fn run_pass(&self, label: &str, events: &[&NotificationEvent], report: &mut DispatchReport) {
        if events.is_empty() {
            return;
        }

        let batch_size = self.settings.batch_size.max(1);
        let semaphore = Semaphore::new(self.settings.max_concurrent.max(1));
        let batches = events.len().div_ceil(batch_size);

        for (index, batch) in events.chunks(batch_size).enumerate() {
            if index > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            debug!("Sending {} batch {}/{} ({} messages)", label, index + 1, batches, batch.len());
            let outcomes = join_all(batch.iter().map(|event| self.deliver(event, &semaphore))).await;

            for (event, delivered) in batch.iter().zip(outcomes) {
                if delivered {
                    report.sent += 1;
                    counter!("repack_notifications_sent_total", "kind" => event.kind()).increment(1);
                    if let NotificationEvent::PriceDrop(notice) = event {
                        report.delivered_drops.push(DeliveredDrop {
                            tracking_id: notice.tracking_id,
                            price: notice.current_price,
                            savings: notice.savings,
                        });
                    }
                } else {
                    report.failed += 1;
                    counter!("repack_delivery_failures_total", "kind" => event.kind()).increment(1);
                    warn!(
                        user = event.user_id(),
                        item = event.tracking_id(),
                        "Notification not delivered"
                    );
                }
            }
        }
    }

    async fn deliver(&self, event: &NotificationEvent, semaphore: &Semaphore) -> bool {
        // The semaphore is never closed
        let _permit = semaphore.acquire().await.ok();
        let text = self.formatter.render(event);

        send_message_with_retry(self.channel.as_ref(), event.user_id(), &text, &self.settings.retry)
            .await
            .is_some()
    }
}

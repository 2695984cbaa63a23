use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::config::OpsConfig;
use crate::models::RunSummary;
use crate::utils::http::post_json_with_retry;
use crate::utils::retry::RetryPolicy;

/// Posts run summaries to a Discord-compatible webhook for operators.
pub struct OpsWebhook {
    client: Client,
    webhook_url: String,
    username: String,
    policy: RetryPolicy,
}

impl OpsWebhook {
    /// `None` when no webhook is configured.
    pub fn from_config(config: &OpsConfig) -> Option<Self> {
        let webhook_url = config.webhook_url.as_deref()?.trim();
        if webhook_url.is_empty() {
            return None;
        }

        Some(Self::new(
            Client::new(),
            webhook_url,
            &config.username,
            config.retry_policy(),
        ))
    }

    pub fn new(client: Client, webhook_url: &str, username: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_string(),
            username: username.to_string(),
            policy,
        }
    }

    fn embed_color(&self, summary: &RunSummary) -> u32 {
        if summary.errors > 0 {
            0xff0000 // Red for aborted or partially failed runs
        } else if summary.delivery_failures > 0 {
            0xff9900 // Orange when some users were not reached
        } else {
            0x00ff00
        }
    }

    fn emoji(&self, summary: &RunSummary) -> &str {
        if summary.errors > 0 {
            "🚨"
        } else if summary.delivery_failures > 0 {
            "⚠️"
        } else {
            "✅"
        }
    }

    pub fn create_payload(&self, run_id: &str, summary: &RunSummary) -> serde_json::Value {
        let embed = json!({
            "title": format!("{} Price check finished", self.emoji(summary)),
            "color": self.embed_color(summary),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "fields": [
                {
                    "name": "📦 Items",
                    "value": format!("**Tracked:** {}\n**Priced:** {}", summary.total_items, summary.fetched),
                    "inline": true
                },
                {
                    "name": "🔔 Events",
                    "value": format!("**Price drops:** {}\n**Unavailable:** {}", summary.price_drops, summary.unavailable),
                    "inline": true
                },
                {
                    "name": "📨 Delivery",
                    "value": format!("**Sent:** {}\n**Failed:** {}", summary.notifications_sent, summary.delivery_failures),
                    "inline": true
                },
                {
                    "name": "❗ Errors",
                    "value": summary.errors.to_string(),
                    "inline": true
                }
            ],
            "footer": { "text": format!("Run {}", run_id) }
        });

        json!({
            "username": self.username,
            "embeds": [embed]
        })
    }

    /// Never fails; returns whether the webhook accepted the report.
    pub async fn report(&self, run_id: &str, summary: &RunSummary) -> bool {
        let payload = self.create_payload(run_id, summary);

        match post_json_with_retry(&self.client, &self.webhook_url, &payload, &self.policy).await {
            Some(response) if response.status().is_success() => {
                info!("Run report posted to ops webhook");
                true
            }
            Some(response) => {
                warn!("Ops webhook rejected run report with status {}", response.status());
                false
            }
            None => false,
        }
    }
}

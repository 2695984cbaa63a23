// Integration tests for Repack Watcher
// These drive the public pipeline with a stub browser and an in-memory inbox

pub mod pipeline_tests;
pub mod store_tests;
pub mod telegram_tests;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use repack_watcher::dispatcher::{DispatchSettings, Dispatcher};
use repack_watcher::extractor::PriceExtractor;
use repack_watcher::marketplace::MarketplaceCatalog;
use repack_watcher::messages::MessageFormatter;
use repack_watcher::models::TrackedItem;
use repack_watcher::plugins::{MessageChannel, MessageReceipt, RecipientId};
use repack_watcher::price_fetcher::PriceFetcher;
use repack_watcher::scraper::{BrowserPage, BrowserSession, SessionLauncher};
use repack_watcher::store::TrackedItemStore;
use repack_watcher::utils::error::{ChannelError, FetchError};
use repack_watcher::utils::retry::RetryPolicy;
use repack_watcher::PriceChecker;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn tracked_item(id: i64, user_id: i64, item_id: &str, paid: &str, threshold: Option<&str>) -> TrackedItem {
    TrackedItem {
        id,
        user_id,
        product_name: Some(format!("Tracked product {}", id)),
        item_id: item_id.to_string(),
        marketplace: "it".to_string(),
        price_paid: dec(paid),
        min_savings_threshold: threshold.map(dec),
        last_notified_price: None,
        consecutive_failures: 0,
        return_deadline: NaiveDate::from_ymd_opt(2031, 3, 1).unwrap(),
    }
}

/// Canned storefront: each item id maps to the price text currently shown.
/// Ids without an entry render a page with no buy box.
#[derive(Clone, Default)]
pub struct StubStorefront {
    prices: Arc<Mutex<HashMap<String, String>>>,
    navigations: Arc<Mutex<Vec<String>>>,
    sessions: Arc<Mutex<(usize, usize)>>,
}

impl StubStorefront {
    pub fn set_price(&self, item_id: &str, text: &str) {
        self.prices.lock().unwrap().insert(item_id.to_string(), text.to_string());
    }

    pub fn remove_price(&self, item_id: &str) {
        self.prices.lock().unwrap().remove(item_id);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    /// `(opened, closed)` session counts.
    pub fn sessions(&self) -> (usize, usize) {
        *self.sessions.lock().unwrap()
    }

    fn page_for(&self, url: &str) -> String {
        let prices = self.prices.lock().unwrap();
        match prices.iter().find(|(id, _)| url.contains(id.as_str())) {
            Some((_, text)) => format!(
                r#"<html><body><div id="corePrice_feature_div"><span class="a-price"><span class="a-offscreen">{}</span></span></div></body></html>"#,
                text
            ),
            None => "<html><body><div id=\"availability\">Currently unavailable.</div></body></html>".to_string(),
        }
    }
}

struct StubSession {
    storefront: StubStorefront,
    closed: bool,
}

struct StubPage {
    storefront: StubStorefront,
    html: Option<String>,
}

#[async_trait]
impl SessionLauncher for StubStorefront {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, FetchError> {
        self.sessions.lock().unwrap().0 += 1;
        Ok(Box::new(StubSession {
            storefront: self.clone(),
            closed: false,
        }))
    }
}

#[async_trait]
impl BrowserSession for StubSession {
    async fn new_page(&mut self, _accept_language: &str) -> Result<Box<dyn BrowserPage>, FetchError> {
        Ok(Box::new(StubPage {
            storefront: self.storefront.clone(),
            html: None,
        }))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.storefront.sessions.lock().unwrap().1 += 1;
        }
    }
}

#[async_trait]
impl BrowserPage for StubPage {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.storefront.navigations.lock().unwrap().push(url.to_string());
        self.html = Some(self.storefront.page_for(url));
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> Result<(), FetchError> {
        match &self.html {
            Some(html) if html.contains("a-offscreen") => Ok(()),
            _ => Err(FetchError::SelectorTimeout {
                selector: selector.to_string(),
            }),
        }
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        self.html
            .clone()
            .ok_or_else(|| FetchError::Content("page not loaded".into()))
    }

    async fn close(&mut self) {}
}

/// Collects delivered messages; listed recipients have blocked the bot.
#[derive(Default)]
pub struct Inbox {
    blocked: Mutex<Vec<RecipientId>>,
    messages: Mutex<Vec<(RecipientId, String)>>,
}

impl Inbox {
    pub fn block(&self, recipient: RecipientId) {
        self.blocked.lock().unwrap().push(recipient);
    }

    pub fn messages(&self) -> Vec<(RecipientId, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn messages_for(&self, recipient: RecipientId) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(r, _)| *r == recipient)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl MessageChannel for Inbox {
    fn name(&self) -> &str {
        "inbox"
    }

    async fn send_message(&self, recipient: RecipientId, text: &str) -> Result<MessageReceipt, ChannelError> {
        if self.blocked.lock().unwrap().contains(&recipient) {
            return Err(ChannelError::Blocked("Forbidden: bot was blocked by the user".into()));
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push((recipient, text.to_string()));
        Ok(MessageReceipt {
            message_id: messages.len() as i64,
        })
    }
}

/// Pipeline wired to the stubs with zero pacing and no retries.
pub fn test_checker(store: Arc<dyn TrackedItemStore>, storefront: &StubStorefront, inbox: Arc<Inbox>) -> PriceChecker {
    let fetcher = PriceFetcher::new(
        Arc::new(storefront.clone()),
        PriceExtractor::default(),
        MarketplaceCatalog::default(),
        Duration::from_secs(1),
    );
    let dispatcher = Dispatcher::new(
        inbox,
        MessageFormatter::default(),
        DispatchSettings {
            batch_size: 10,
            batch_delay: Duration::ZERO,
            max_concurrent: 5,
            retry: RetryPolicy::new(0, Duration::ZERO),
        },
    );

    PriceChecker::new(store, fetcher, dispatcher, Duration::ZERO)
}

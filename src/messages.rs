use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::marketplace::MarketplaceCatalog;
use crate::models::{NotificationEvent, PriceDropNotice, UnavailableNotice};

/// Renders notification events as Telegram HTML.
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter {
    catalog: MarketplaceCatalog,
}

impl MessageFormatter {
    pub fn new(catalog: MarketplaceCatalog) -> Self {
        Self { catalog }
    }

    pub fn render(&self, event: &NotificationEvent) -> String {
        self.render_at(event, Utc::now().date_naive())
    }

    /// `today` drives the days-remaining suffix of the deadline.
    pub fn render_at(&self, event: &NotificationEvent, today: NaiveDate) -> String {
        match event {
            NotificationEvent::PriceDrop(notice) => self.price_drop(notice, today),
            NotificationEvent::Unavailable(notice) => self.unavailable(notice, today),
        }
    }

    fn price_drop(&self, notice: &PriceDropNotice, today: NaiveDate) -> String {
        let url = self.catalog.product_url(&notice.item_id, &notice.marketplace);
        format!(
            "🎉 <b>Price drop on Amazon!</b>\n\n\
             📦 <b>{}</b>\n\n\
             Current price: <b>{}</b>\n\
             Price paid: {}\n\
             💰 Savings: <b>{}</b>\n\n\
             📅 Return deadline: {}\n\n\
             🔗 <a href=\"{}\">Open product</a>",
            escape_html(&notice.product_label),
            money(notice.current_price),
            money(notice.price_paid),
            money(notice.savings),
            deadline_text(notice.deadline, today),
            escape_html(&url),
        )
    }

    fn unavailable(&self, notice: &UnavailableNotice, today: NaiveDate) -> String {
        let url = self.catalog.product_url(&notice.item_id, &notice.marketplace);
        format!(
            "⚠️ <b>Price not available</b>\n\n\
             📦 <b>{}</b>\n\n\
             The price could not be read for {} consecutive checks. \
             The product may be out of stock or the page may have changed. \
             Please check it manually.\n\n\
             📅 Return deadline: {}\n\n\
             🔗 <a href=\"{}\">Open product</a>",
            escape_html(&notice.product_label),
            notice.failures,
            deadline_text(notice.deadline, today),
            escape_html(&url),
        )
    }
}

fn money(amount: Decimal) -> String {
    format!("€{:.2}", amount.round_dp(2))
}

fn deadline_text(deadline: NaiveDate, today: NaiveDate) -> String {
    let date = deadline.format("%d/%m/%Y");
    let days = (deadline - today).num_days();
    match days {
        d if d > 1 => format!("{} (in {} days)", date, d),
        1 => format!("{} (in 1 day)", date),
        0 => format!("{} (<b>today</b>)", date),
        _ => format!("{} (<b>expired</b>)", date),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

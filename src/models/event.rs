use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TrackedItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDropNotice {
    pub tracking_id: i64,
    pub user_id: i64,
    pub item_id: String,
    pub marketplace: String,
    pub product_label: String,
    pub current_price: Decimal,
    pub price_paid: Decimal,
    pub savings: Decimal,
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableNotice {
    pub tracking_id: i64,
    pub user_id: i64,
    pub item_id: String,
    pub marketplace: String,
    pub product_label: String,
    pub failures: u32,
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    PriceDrop(PriceDropNotice),
    Unavailable(UnavailableNotice),
}

impl NotificationEvent {
    pub fn price_drop(item: &TrackedItem, current_price: Decimal, savings: Decimal) -> Self {
        NotificationEvent::PriceDrop(PriceDropNotice {
            tracking_id: item.id,
            user_id: item.user_id,
            item_id: item.item_id.clone(),
            marketplace: item.marketplace.clone(),
            product_label: item.label(),
            current_price,
            price_paid: item.price_paid,
            savings,
            deadline: item.return_deadline,
        })
    }

    pub fn unavailable(item: &TrackedItem, failures: u32) -> Self {
        NotificationEvent::Unavailable(UnavailableNotice {
            tracking_id: item.id,
            user_id: item.user_id,
            item_id: item.item_id.clone(),
            marketplace: item.marketplace.clone(),
            product_label: item.label(),
            failures,
            deadline: item.return_deadline,
        })
    }

    pub fn tracking_id(&self) -> i64 {
        match self {
            NotificationEvent::PriceDrop(n) => n.tracking_id,
            NotificationEvent::Unavailable(n) => n.tracking_id,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            NotificationEvent::PriceDrop(n) => n.user_id,
            NotificationEvent::Unavailable(n) => n.user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::PriceDrop(_) => "price_drop",
            NotificationEvent::Unavailable(_) => "unavailable",
        }
    }
}

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A purchase being watched during its return window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[validate(schema(function = "validate_price_rules", skip_on_field_errors = false))]
pub struct TrackedItem {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub product_name: Option<String>,

    #[validate(length(equal = 10, message = "item identifier must be 10 characters"))]
    pub item_id: String,
    pub marketplace: String,

    pub price_paid: Decimal,
    #[serde(default)]
    pub min_savings_threshold: Option<Decimal>,
    #[serde(default)]
    pub last_notified_price: Option<Decimal>,
    #[serde(default)]
    pub consecutive_failures: u32,

    pub return_deadline: NaiveDate,
}

impl TrackedItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.item_id, &self.marketplace)
    }

    pub fn threshold(&self) -> Decimal {
        self.min_savings_threshold.unwrap_or(Decimal::ZERO)
    }

    /// Human label used in notifications.
    pub fn label(&self) -> String {
        match self.product_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("ASIN {}", self.item_id),
        }
    }
}

fn validate_price_rules(item: &TrackedItem) -> Result<(), ValidationError> {
    if item.price_paid <= Decimal::ZERO {
        let mut err = ValidationError::new("price_paid_not_positive");
        err.message = Some("price paid must be positive".into());
        return Err(err);
    }

    let threshold = item.threshold();
    if threshold < Decimal::ZERO {
        let mut err = ValidationError::new("threshold_negative");
        err.message = Some("savings threshold cannot be negative".into());
        return Err(err);
    }
    if threshold >= item.price_paid {
        let mut err = ValidationError::new("threshold_not_below_paid");
        err.message = Some("savings threshold must be below the price paid".into());
        return Err(err);
    }

    Ok(())
}

/// Deduplication key for price lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub item_id: String,
    pub marketplace: String,
}

impl ItemKey {
    pub fn new(item_id: &str, marketplace: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            marketplace: marketplace.to_string(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item_id, self.marketplace)
    }
}

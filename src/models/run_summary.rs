use serde::{Deserialize, Serialize};

/// Counters for one fetch-decide-dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_items: usize,
    pub fetched: usize,
    pub price_drops: usize,
    pub unavailable: usize,
    pub notifications_sent: usize,
    pub delivery_failures: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.delivery_failures == 0
    }
}

//! Canonical `(item id, marketplace)` extraction from product URLs.
//!
//! Pure text parsing: no network access, no clock, no randomness.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::marketplace::{MarketplaceCatalog, host_suffix};
use crate::models::ItemKey;
use crate::utils::error::IdentityError;

// Canonical path first, then legacy product path, then short links.
static ITEM_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/dp/([A-Z0-9]{10})(?:[/?#&]|$)",
        r"/gp/product/([A-Z0-9]{10})(?:[/?#&]|$)",
        r"/d/([A-Z0-9]{10})(?:[/?#&]|$)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid item id pattern"))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub item_id: String,
    pub marketplace: String,
}

impl ResolvedItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.item_id, &self.marketplace)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    catalog: MarketplaceCatalog,
}

impl IdentityResolver {
    pub fn new(catalog: MarketplaceCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MarketplaceCatalog {
        &self.catalog
    }

    /// Fails only when no item identifier is present; an unknown storefront
    /// falls back to the default marketplace.
    pub fn resolve(&self, url: &str) -> Result<ResolvedItem, IdentityError> {
        let url = url.trim();
        let item_id = extract_item_id(url).ok_or_else(|| IdentityError::InvalidIdentity {
            url: url.to_string(),
        })?;

        let marketplace = match self.extract_marketplace(url) {
            Some(code) => code,
            None => {
                warn!(
                    "Could not determine marketplace from URL {}, defaulting to '{}'",
                    url,
                    self.catalog.default_code()
                );
                self.catalog.default_code().to_string()
            }
        };

        debug!("Resolved {} to {}@{}", url, item_id, marketplace);
        Ok(ResolvedItem { item_id, marketplace })
    }

    /// Marketplace code from the host suffix after the shared domain.
    pub fn extract_marketplace(&self, url: &str) -> Option<String> {
        let host = parse_host(url)?;
        let suffix = host_suffix(&host, self.catalog.domain())?;
        self.catalog.code_for_suffix(suffix).map(str::to_string)
    }
}

pub fn extract_item_id(url: &str) -> Option<String> {
    ITEM_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).or_else(|_| Url::parse(&format!("https://{}", url))).ok()?;
    parsed.host_str().map(|host| host.to_ascii_lowercase())
}

//! Price extraction from rendered product pages.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::utils::error::{AppError, Result};

/// Buy-box containers first; the generic `.a-price` match last because it
/// also hits prices of other listings and variants on the same page.
pub const DEFAULT_PRICE_SELECTORS: &[&str] = &[
    "#corePrice_feature_div .a-price .a-offscreen",
    "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
    "#priceblock_dealprice",
    "#priceblock_ourprice",
    "#price_inside_buybox",
    ".a-price .a-offscreen",
];

pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const MAX_PRICE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 0);

static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.,]*").expect("valid number token pattern"));

static DEFAULT_LOCATORS: LazyLock<Vec<PriceLocator>> = LazyLock::new(|| {
    DEFAULT_PRICE_SELECTORS
        .iter()
        .map(|css| PriceLocator::parse(css).expect("valid default price selector"))
        .collect()
});

/// One CSS strategy; yields the first matching element with non-empty text.
#[derive(Debug, Clone)]
pub struct PriceLocator {
    css: String,
    selector: Selector,
}

impl PriceLocator {
    pub fn parse(css: &str) -> Result<Self> {
        let selector = Selector::parse(css).map_err(|e| AppError::Parse {
            message: format!("invalid price selector '{}': {}", css, e),
        })?;
        Ok(Self {
            css: css.to_string(),
            selector,
        })
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    fn first_text(&self, document: &Html) -> Option<String> {
        document.select(&self.selector).find_map(|element| {
            let text = element.text().collect::<String>();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }
}

#[derive(Debug, Clone)]
pub struct PriceExtractor {
    locators: Vec<PriceLocator>,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self {
            locators: DEFAULT_LOCATORS.clone(),
        }
    }
}

impl PriceExtractor {
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Result<Self> {
        if selectors.is_empty() {
            return Err(AppError::Validation("at least one price selector is required".into()));
        }

        let locators = selectors
            .iter()
            .map(|css| PriceLocator::parse(css.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { locators })
    }

    /// Selector group satisfied as soon as any locator is present.
    pub fn wait_selector(&self) -> String {
        self.locators
            .iter()
            .map(PriceLocator::css)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Price from the first locator that yields text, or `None`.
    ///
    /// Never fails on malformed content: a missing element, unparsable text or
    /// an out-of-range value all come back as `None`.
    pub fn extract(&self, html: &str) -> Option<Decimal> {
        let document = Html::parse_document(html);

        let Some((css, text)) = self
            .locators
            .iter()
            .find_map(|locator| locator.first_text(&document).map(|text| (locator.css(), text)))
        else {
            debug!("No price locator matched");
            return None;
        };

        match parse_price(&text) {
            Some(price) => {
                debug!("Extracted price {} via '{}'", price, css);
                Some(price)
            }
            None => {
                warn!("Could not parse price text '{}' found via '{}'", text, css);
                None
            }
        }
    }
}

/// Parses price text in either `1.234,56` or `1,234.56` notation.
///
/// Currency symbols and whitespace are ignored, ranges keep their first value,
/// and values outside `[MIN_PRICE, MAX_PRICE]` are rejected.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let token = NUMBER_TOKEN.find(&compact)?.as_str();
    let token = token.trim_end_matches([',', '.']);

    let normalized = normalize_separators(token);
    let price = Decimal::from_str(&normalized).ok()?;

    if price < MIN_PRICE || price > MAX_PRICE {
        warn!("Price {} outside accepted range, ignoring", price);
        return None;
    }

    Some(price)
}

fn normalize_separators(token: &str) -> String {
    match (token.rfind(','), token.rfind('.')) {
        (Some(comma), Some(dot)) => {
            let (decimal, thousands) = if comma > dot { (',', '.') } else { ('.', ',') };
            token.replace(thousands, "").replace(decimal, ".")
        }
        (Some(pos), None) => single_separator(token, ',', pos),
        (None, Some(pos)) => single_separator(token, '.', pos),
        (None, None) => token.to_string(),
    }
}

/// A lone separator is decimal unless it repeats or groups exactly three digits.
fn single_separator(token: &str, sep: char, last: usize) -> String {
    let repeated = token.matches(sep).count() > 1;
    let grouping = token.len() - last - 1 == 3;

    if repeated || grouping {
        token.replace(sep, "")
    } else {
        token.replace(sep, ".")
    }
}

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::MarketplaceConfig;

/// Storefront hosts per marketplace code, plus the shared second-level domain.
#[derive(Debug, Clone)]
pub struct MarketplaceCatalog {
    domain: String,
    default_code: String,
    affiliate_tag: Option<String>,
    hosts: BTreeMap<String, String>,
    languages: BTreeMap<String, String>,
}

const FALLBACK_LANGUAGE: &str = "en-US,en;q=0.9";

impl Default for MarketplaceCatalog {
    fn default() -> Self {
        Self::from_config(&MarketplaceConfig::default())
    }
}

impl MarketplaceCatalog {
    pub fn from_config(config: &MarketplaceConfig) -> Self {
        Self {
            domain: config.domain.to_ascii_lowercase(),
            default_code: config.default_code.clone(),
            affiliate_tag: config
                .affiliate_tag
                .as_deref()
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string),
            hosts: config
                .hosts
                .iter()
                .map(|(code, host)| (code.to_ascii_lowercase(), host.to_ascii_lowercase()))
                .collect(),
            languages: config
                .languages
                .iter()
                .map(|(code, language)| (code.to_ascii_lowercase(), language.trim().to_string()))
                .filter(|(_, language)| !language.is_empty())
                .collect(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    pub fn host(&self, code: &str) -> Option<&str> {
        self.hosts.get(code).map(String::as_str)
    }

    /// `Accept-Language` for product pages of `code`.
    pub fn accept_language(&self, code: &str) -> &str {
        self.languages
            .get(code)
            .or_else(|| self.languages.get(&self.default_code))
            .map(String::as_str)
            .unwrap_or(FALLBACK_LANGUAGE)
    }

    /// Maps a host suffix such as `co.uk` back to its marketplace code.
    pub fn code_for_suffix(&self, suffix: &str) -> Option<&str> {
        let suffix = suffix.to_ascii_lowercase();
        self.hosts.iter().find_map(|(code, host)| {
            (host_suffix(host, &self.domain)? == suffix).then_some(code.as_str())
        })
    }

    /// Canonical product page for `item_id`, tagged when an affiliate tag is set.
    pub fn product_url(&self, item_id: &str, code: &str) -> String {
        let host = match self.host(code) {
            Some(host) => host,
            None => {
                warn!(
                    "Unknown marketplace '{}', falling back to '{}'",
                    code, self.default_code
                );
                self.host(&self.default_code).unwrap_or("www.amazon.it")
            }
        };

        match &self.affiliate_tag {
            Some(tag) => format!("https://{}/dp/{}?tag={}", host, item_id, tag),
            None => format!("https://{}/dp/{}", host, item_id),
        }
    }
}

/// `www.amazon.co.uk` -> `co.uk` for domain `amazon`.
pub(crate) fn host_suffix<'a>(host: &'a str, domain: &str) -> Option<&'a str> {
    let marker = format!("{}.", domain);
    let start = if host.starts_with(&marker) {
        0
    } else {
        host.find(&format!(".{}", marker))? + 1
    };
    let suffix = &host[start + marker.len()..];
    (!suffix.is_empty()).then_some(suffix)
}

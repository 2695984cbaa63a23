use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::extractor::DEFAULT_PRICE_SELECTORS;
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub marketplaces: MarketplaceConfig,
    pub telegram: TelegramConfig,
    pub notifications: NotificationsConfig,
    pub ops: OpsConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Pause between two distinct product lookups, in seconds.
    pub pace_seconds: f64,
    pub navigation_timeout: u64,
    pub selector_timeout: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub price_selectors: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            pace_seconds: 1.5,
            navigation_timeout: 30,
            selector_timeout: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            chrome_path: None,
            headless: true,
            price_selectors: DEFAULT_PRICE_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScraperConfig {
    pub fn pace(&self) -> Duration {
        seconds(self.pace_seconds)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub domain: String,
    pub default_code: String,
    pub affiliate_tag: Option<String>,
    /// Marketplace code to storefront host.
    pub hosts: BTreeMap<String, String>,
    /// Marketplace code to `Accept-Language` sent with product page requests.
    pub languages: BTreeMap<String, String>,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        let hosts = [
            ("it", "www.amazon.it"),
            ("com", "www.amazon.com"),
            ("de", "www.amazon.de"),
            ("fr", "www.amazon.fr"),
            ("es", "www.amazon.es"),
            ("uk", "www.amazon.co.uk"),
            ("nl", "www.amazon.nl"),
            ("be", "www.amazon.com.be"),
            ("se", "www.amazon.se"),
            ("pl", "www.amazon.pl"),
            ("jp", "www.amazon.co.jp"),
            ("au", "www.amazon.com.au"),
            ("ca", "www.amazon.ca"),
            ("br", "www.amazon.com.br"),
        ]
        .into_iter()
        .map(|(code, host)| (code.to_string(), host.to_string()))
        .collect();

        let languages = [
            ("it", "it-IT,it;q=0.9,en;q=0.8"),
            ("com", "en-US,en;q=0.9"),
            ("de", "de-DE,de;q=0.9,en;q=0.8"),
            ("fr", "fr-FR,fr;q=0.9,en;q=0.8"),
            ("es", "es-ES,es;q=0.9,en;q=0.8"),
            ("uk", "en-GB,en;q=0.9"),
            ("nl", "nl-NL,nl;q=0.9,en;q=0.8"),
            ("be", "fr-BE,fr;q=0.9,nl-BE;q=0.8,en;q=0.7"),
            ("se", "sv-SE,sv;q=0.9,en;q=0.8"),
            ("pl", "pl-PL,pl;q=0.9,en;q=0.8"),
            ("jp", "ja-JP,ja;q=0.9,en;q=0.8"),
            ("au", "en-AU,en;q=0.9"),
            ("ca", "en-CA,en;q=0.9,fr-CA;q=0.8"),
            ("br", "pt-BR,pt;q=0.9,en;q=0.8"),
        ]
        .into_iter()
        .map(|(code, language)| (code.to_string(), language.to_string()))
        .collect();

        Self {
            domain: "amazon".to_string(),
            default_code: "it".to_string(),
            affiliate_tag: None,
            hosts,
            languages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
    pub request_timeout: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            request_timeout: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub batch_size: usize,
    pub delay_between_batches: f64,
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_base_delay: f64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay_between_batches: 1.0,
            max_concurrent: 5,
            max_retries: 3,
            retry_base_delay: 1.0,
        }
    }
}

impl NotificationsConfig {
    pub fn batch_delay(&self) -> Duration {
        seconds(self.delay_between_batches)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, seconds(self.retry_base_delay))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub webhook_url: Option<String>,
    pub username: String,
    pub max_retries: u32,
    pub retry_base_delay: f64,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Repack Watcher".to_string(),
            max_retries: 2,
            retry_base_delay: 1.0,
        }
    }
}

impl OpsConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, seconds(self.retry_base_delay))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "repack-watcher.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/tracked_items.json".to_string(),
        }
    }
}

/// Negative or non-finite values collapse to zero; `validate` rejects them first.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new("config"))
    }

    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let file = |name: &str| config_dir.join(name).to_string_lossy().into_owned();

        let s = Config::builder()
            // Built-in defaults come from the serde defaults on each section
            .add_source(File::with_name(&file("default")).required(false))
            .add_source(File::with_name(&file(&run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name(&file("local")).required(false))
            // Environment variables such as REPACK__TELEGRAM__BOT_TOKEN
            .add_source(Environment::with_prefix("REPACK").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.telegram.bot_token.is_empty() {
            if let Ok(token) = env::var("TELEGRAM_TOKEN") {
                config.telegram.bot_token = token;
            }
        }

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Scraper
        if !self.scraper.pace_seconds.is_finite() || self.scraper.pace_seconds < 0.0 {
            return Err(ConfigError::Message("Scraper pace_seconds must be a non-negative number".into()));
        }

        if self.scraper.navigation_timeout == 0 {
            return Err(ConfigError::Message("Scraper navigation_timeout must be greater than 0".into()));
        }

        if self.scraper.price_selectors.is_empty() {
            return Err(ConfigError::Message("Scraper price_selectors cannot be empty".into()));
        }

        for selector in &self.scraper.price_selectors {
            if scraper::Selector::parse(selector).is_err() {
                return Err(ConfigError::Message(format!("Invalid price selector: {}", selector)));
            }
        }

        // Marketplaces
        if self.marketplaces.domain.trim().is_empty() {
            return Err(ConfigError::Message("Marketplace domain cannot be empty".into()));
        }

        if !self.marketplaces.hosts.contains_key(&self.marketplaces.default_code) {
            return Err(ConfigError::Message(format!(
                "Default marketplace '{}' has no configured host",
                self.marketplaces.default_code
            )));
        }

        // Telegram
        if Url::parse(&self.telegram.api_base).is_err() {
            return Err(ConfigError::Message("Invalid Telegram api_base URL".into()));
        }

        // Notifications
        if self.notifications.batch_size == 0 {
            return Err(ConfigError::Message("Notifications batch_size must be greater than 0".into()));
        }

        if self.notifications.max_concurrent == 0 {
            return Err(ConfigError::Message("Notifications max_concurrent must be greater than 0".into()));
        }

        for (name, value) in [
            ("delay_between_batches", self.notifications.delay_between_batches),
            ("retry_base_delay", self.notifications.retry_base_delay),
            ("ops retry_base_delay", self.ops.retry_base_delay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Message(format!("Notifications {} must be a non-negative number", name)));
            }
        }

        // Ops
        if let Some(webhook_url) = &self.ops.webhook_url {
            if Url::parse(webhook_url).is_err() {
                return Err(ConfigError::Message("Invalid ops webhook_url".into()));
            }
        }

        Ok(())
    }

    /// Checks settings only the `check` command needs.
    pub fn require_telegram(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "Telegram bot_token is required (set REPACK__TELEGRAM__BOT_TOKEN or TELEGRAM_TOKEN)".into(),
            ));
        }
        Ok(())
    }
}

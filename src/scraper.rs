//! Browser session primitives and the headless Chrome implementation.
//!
//! A session is one browser process shared by sequential lookups; each lookup
//! opens its own page so a broken page never poisons the next one.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::utils::error::FetchError;

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, FetchError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    /// Opens a page whose requests carry `accept_language`.
    async fn new_page(&mut self, accept_language: &str) -> Result<Box<dyn BrowserPage>, FetchError>;

    /// Releases the session. Later calls are no-ops.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrowserPage: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), FetchError>;

    async fn content(&mut self) -> Result<String, FetchError>;

    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub navigation_timeout: Duration,
}

impl ChromeOptions {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.as_ref().map(PathBuf::from),
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            navigation_timeout: config.navigation_timeout(),
        }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>, FetchError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(Duration::from_secs(300))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| FetchError::Launch(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.chrome_path {
            launch_options.path = Some(chrome_path.clone());
        }

        Ok(launch_options)
    }
}

/// Launches one headless Chrome process per session.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    options: ChromeOptions,
}

impl ChromeLauncher {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(ChromeOptions::from_config(config))
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, FetchError> {
        let options = self.options.clone();
        let browser = run_blocking(move || {
            let launch_options = options.launch_options()?;
            Browser::new(launch_options)
                .map_err(|e| FetchError::Launch(format!("Failed to launch browser: {}", e)))
        })
        .await?;

        debug!("Browser session opened");
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            user_agent: self.options.user_agent.clone(),
            navigation_timeout: self.options.navigation_timeout,
        }))
    }
}

/// Dropping the session drops the `Browser`, which kills the Chrome process.
pub struct ChromeSession {
    browser: Option<Browser>,
    user_agent: String,
    navigation_timeout: Duration,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&mut self, accept_language: &str) -> Result<Box<dyn BrowserPage>, FetchError> {
        let browser = self
            .browser
            .clone()
            .ok_or_else(|| FetchError::Page("browser session already closed".into()))?;
        let user_agent = self.user_agent.clone();
        let accept_language = accept_language.to_string();
        let timeout = self.navigation_timeout;

        let tab = run_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| FetchError::Page(format!("Failed to create tab: {}", e)))?;
            tab.set_user_agent(&user_agent, Some(&accept_language), None)
                .map_err(|e| FetchError::Page(format!("Failed to set user agent: {}", e)))?;
            tab.set_default_timeout(timeout);
            Ok(tab)
        })
        .await?;

        Ok(Box::new(ChromePage { tab: Some(tab) }))
    }

    async fn close(&mut self) {
        if let Some(browser) = self.browser.take() {
            // Dropping the last handle kills the process and waits for it
            if let Err(e) = tokio::task::spawn_blocking(move || drop(browser)).await {
                warn!("Browser shutdown task failed: {}", e);
            }
            debug!("Browser session closed");
        }
    }
}

pub struct ChromePage {
    tab: Option<Arc<Tab>>,
}

impl ChromePage {
    fn tab(&self) -> Result<Arc<Tab>, FetchError> {
        self.tab
            .clone()
            .ok_or_else(|| FetchError::Page("page already closed".into()))
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        let tab = self.tab()?;
        let url = url.to_string();

        run_blocking(move || {
            tab.navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| FetchError::Navigation {
                    url: url.clone(),
                    message: e.to_string(),
                })
        })
        .await
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), FetchError> {
        let tab = self.tab()?;
        let selector = selector.to_string();

        run_blocking(move || {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .map(|_| ())
                .map_err(|_| FetchError::SelectorTimeout { selector: selector.clone() })
        })
        .await
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        let tab = self.tab()?;

        run_blocking(move || {
            tab.get_content()
                .map_err(|e| FetchError::Content(e.to_string()))
        })
        .await
    }

    async fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            let result = tokio::task::spawn_blocking(move || tab.close(true).map(|_| ())).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Failed to close tab: {}", e),
                Err(e) => warn!("Tab close task failed: {}", e),
            }
        }
    }
}

/// DevTools calls block on a websocket round-trip; keep them off the runtime.
async fn run_blocking<T, F>(task: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FetchError::Page(format!("browser task failed: {}", e)))?
}

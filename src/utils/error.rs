use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Scraping error: {0}")]
    Scraping(#[from] FetchError),

    #[error("Delivery error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

/// Raised by the identity resolver for user-supplied URLs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Could not extract an item identifier from URL: {url}")]
    InvalidIdentity { url: String },
}

/// Failures of the browser session and its pages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open page: {0}")]
    Page(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out waiting for selector: {selector}")]
    SelectorTimeout { selector: String },

    #[error("Failed to read page content: {0}")]
    Content(String),
}

/// Failures reported by the outbound messaging channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Server error ({status}): {description}")]
    Server { status: u16, description: String },

    #[error("Recipient blocked the bot: {0}")]
    Blocked(String),

    #[error("Message rejected ({status}): {description}")]
    Rejected { status: u16, description: String },
}

impl ChannelError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelError::Network(_) => "network",
            ChannelError::Timeout => "timeout",
            ChannelError::RateLimited { .. } => "rate_limited",
            ChannelError::Server { .. } => "server",
            ChannelError::Blocked(_) => "blocked",
            ChannelError::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Tracked item not found: {id}")]
    NotFound { id: i64 },

    #[error("Store I/O failed: {0}")]
    Io(String),

    #[error("Store data is corrupt: {0}")]
    Corrupt(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

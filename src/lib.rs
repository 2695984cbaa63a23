pub mod checker;
pub mod config;
pub mod decision;
pub mod dispatcher;
pub mod extractor;
pub mod identity;
pub mod marketplace;
pub mod messages;
pub mod models;
pub mod plugins;
pub mod price_fetcher;
pub mod scraper;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use checker::PriceChecker;
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;

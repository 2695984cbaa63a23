// Outbound channel implementations
pub mod telegram;
pub mod webhook;

pub use telegram::TelegramChannel;
pub use webhook::OpsWebhook;

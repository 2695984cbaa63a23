pub mod notifiers;
pub mod traits;

pub use notifiers::{OpsWebhook, TelegramChannel};
pub use traits::{MessageChannel, MessageReceipt, RecipientId};

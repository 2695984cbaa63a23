pub mod channel;

pub use channel::{MessageChannel, MessageReceipt, RecipientId};

#[cfg(test)]
pub use channel::MockMessageChannel;

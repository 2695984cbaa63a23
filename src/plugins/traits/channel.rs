use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::ChannelError;

/// Chat identifier on the messaging channel.
pub type RecipientId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: i64,
}

/// Outbound messaging primitive (Telegram, test doubles).
///
/// Implementations classify failures into [`ChannelError`] variants; the
/// retry layer decides what is transient from that classification alone.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send_message(
        &self,
        recipient: RecipientId,
        text: &str,
    ) -> Result<MessageReceipt, ChannelError>;
}

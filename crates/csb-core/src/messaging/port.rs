use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::{ChatRole, DeliveryError, EditResult, InlineKeyboard, MessagingCapabilities},
};

/// Outbound chat transport.
///
/// Every fallible call returns an already-classified result so callers can
/// branch on variants instead of inspecting error text.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef, DeliveryError>;

    async fn edit_html(&self, msg: MessageRef, html: &str) -> EditResult;

    async fn delete_message(&self, msg: MessageRef) -> Result<(), DeliveryError>;

    async fn chat_member_role(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatRole, DeliveryError>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), DeliveryError>;
}

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use teloxide::types::{ChatAction, InlineKeyboardMarkup, Message, MessageId};

use super::bot_state::BotState;
use super::telegram_utils::{CompactChat, CompactUser};
use crate::apis::telegram::{ReplyTarget, TelegramError, TelegramResult};
use crate::editing::flow::Collaborators;
use crate::editing::result_relay::ChatSink;

#[derive(Clone)]
pub struct CommandContext {
    pub chat: CompactChat,
    pub user: CompactUser,
    pub message: Message,
    pub bot_state: Arc<BotState>,
}

impl CommandContext {
    pub fn new(message: Message, user: CompactUser, bot_state: Arc<BotState>) -> Self {
        Self { chat: CompactChat::from(&message.chat), user, message, bot_state }
    }

    fn target(&self) -> ReplyTarget {
        ReplyTarget::of(&self.message)
    }

    /// unix seconds, the clock rate limits run on
    pub fn sent_at(&self) -> i64 {
        self.message.date.timestamp()
    }

    pub async fn reply_custom(
        &self,
        text: String,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> TelegramResult<MessageId> {
        self.bot_state.api.reply_text(self.target(), text, reply_markup).await
    }

    pub async fn reply(&self, text: String) -> TelegramResult<MessageId> {
        self.reply_custom(text, None).await
    }

    pub async fn delete_message(&self, message_id: MessageId) -> TelegramResult<()> {
        self.bot_state.api.delete(self.chat.id, message_id).await
    }

    pub async fn send_action(&self, action: ChatAction) -> TelegramResult<()> {
        self.bot_state.api.chat_action(self.target(), action).await
    }

    pub async fn send_typing(&self) -> TelegramResult<()> {
        self.send_action(ChatAction::Typing).await
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            fetcher: self.bot_state.fetcher.as_ref(),
            providers: &self.bot_state.providers,
            relay: self.bot_state.relay.as_ref(),
            chat: self,
        }
    }
}

#[async_trait]
impl ChatSink for CommandContext {
    async fn send_photo(&self, image: Bytes) -> Result<(), TelegramError> {
        self.bot_state.api.reply_photo(self.target(), image).await
    }

    async fn send_text(&self, text: String) -> Result<(), TelegramError> {
        self.reply(text).await?;

        Ok(())
    }
}

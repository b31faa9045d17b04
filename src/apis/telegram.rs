use async_trait::async_trait;
use bytes::Bytes;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatAction, ChatId, InlineKeyboardMarkup, InputFile, Message, MessageId,
    ReplyParameters, ThreadId,
};
use teloxide::{Bot, RequestError};

pub type TelegramError = RequestError;
pub type TelegramResult<T> = Result<T, TelegramError>;

/// the message a handler answers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: ChatId,
    pub thread_id: Option<ThreadId>,
    pub message_id: MessageId,
}

impl ReplyTarget {
    pub fn of(message: &Message) -> Self {
        Self { chat_id: message.chat.id, thread_id: message.thread_id, message_id: message.id }
    }
}

/// the Bot API calls handlers make while serving a user
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn reply_text(
        &self,
        target: ReplyTarget,
        text: String,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> TelegramResult<MessageId>;

    async fn reply_photo(&self, target: ReplyTarget, photo: Bytes) -> TelegramResult<()>;

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    ) -> TelegramResult<()>;

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> TelegramResult<()>;

    async fn chat_action(&self, target: ReplyTarget, action: ChatAction) -> TelegramResult<()>;

    async fn answer_query(
        &self,
        query: &CallbackQuery,
        text: Option<String>,
    ) -> TelegramResult<()>;
}

#[async_trait]
impl TelegramApi for Bot {
    async fn reply_text(
        &self,
        target: ReplyTarget,
        text: String,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> TelegramResult<MessageId> {
        let mut request = self
            .send_message(target.chat_id, text)
            .reply_parameters(ReplyParameters::new(target.message_id));

        if let Some(thread_id) = target.thread_id {
            request = request.message_thread_id(thread_id);
        }
        if let Some(reply_markup) = reply_markup {
            request = request.reply_markup(reply_markup);
        }

        Ok(request.send().await?.id)
    }

    async fn reply_photo(&self, target: ReplyTarget, photo: Bytes) -> TelegramResult<()> {
        let mut request = self
            .send_photo(target.chat_id, InputFile::memory(photo.to_vec()).file_name("result.png"))
            .reply_parameters(ReplyParameters::new(target.message_id));

        if let Some(thread_id) = target.thread_id {
            request = request.message_thread_id(thread_id);
        }

        request.send().await?;
        Ok(())
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    ) -> TelegramResult<()> {
        self.edit_message_text(chat_id, message_id, text).send().await?;
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> TelegramResult<()> {
        self.delete_message(chat_id, message_id).send().await?;
        Ok(())
    }

    async fn chat_action(&self, target: ReplyTarget, action: ChatAction) -> TelegramResult<()> {
        let mut request = self.send_chat_action(target.chat_id, action);

        if let Some(thread_id) = target.thread_id {
            request = request.message_thread_id(thread_id);
        }

        request.send().await?;
        Ok(())
    }

    async fn answer_query(
        &self,
        query: &CallbackQuery,
        text: Option<String>,
    ) -> TelegramResult<()> {
        let mut request = self.answer_callback_query(query.id.clone());

        if let Some(text) = text {
            request = request.text(text);
        }

        request.send().await?;
        Ok(())
    }
}

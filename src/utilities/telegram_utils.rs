use std::fmt;

use teloxide::types::{
    Chat, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message, MessageEntity, PhotoSize,
    User,
};

use crate::editing::invoker::Providers;
use crate::editing::variant::GenerationVariant;

#[derive(Clone)]
pub struct CompactChat {
    pub id: ChatId,
    pub is_private: bool,
    pub title: String,
}

impl From<&Chat> for CompactChat {
    fn from(value: &Chat) -> Self {
        Self {
            id: value.id,
            is_private: value.is_private(),
            title: value.title().unwrap_or_default().into(),
        }
    }
}

impl fmt::Display for CompactChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_private { write!(f, "PM") } else { write!(f, "{:?}", self.title) }
    }
}

#[derive(Clone)]
pub struct CompactUser {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

impl From<&User> for CompactUser {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.0,
            first_name: value.first_name.clone(),
            last_name: value.last_name.clone().unwrap_or_default(),
            username: value.username.clone(),
        }
    }
}

impl fmt::Display for CompactUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(username) = &self.username {
            write!(f, "@{username}")?;
        } else {
            write!(f, "{}", self.first_name)?;
            if !self.last_name.is_empty() {
                write!(f, " {}", self.last_name)?;
            }
        }

        Ok(())
    }
}

/// text or caption, with its entities
pub fn get_message_text(message: &Message) -> Option<(&str, &[MessageEntity])> {
    if let Some(text) = message.text() {
        Some((text, message.entities().unwrap_or_default()))
    } else {
        message.caption().map(|caption| (caption, message.caption_entities().unwrap_or_default()))
    }
}

pub fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes.iter().max_by_key(|size| u64::from(size.width) * u64::from(size.height))
}

/// one button per edit variant the configured providers can serve, usable only by `owner`
pub fn variant_keyboard(providers: &Providers, owner: u64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        GenerationVariant::edit_variants().filter(|variant| providers.supports(*variant)).map(
            |variant| {
                [InlineKeyboardButton::callback(variant.to_string(), variant.callback_data(owner))]
            },
        ),
    )
}

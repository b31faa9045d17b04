use async_trait::async_trait;

use crate::apis::telegram::TelegramError;
use crate::editing::acquirer::FetchError;
use crate::utilities::command_context::CommandContext;
use crate::utilities::rate_limit::RateLimiter;

pub mod cancel;
pub mod generate;
pub mod ping;
pub mod start;

pub type CommandResult = Result<(), CommandError>;

#[async_trait]
pub trait CommandTrait {
    fn command_names(&self) -> &[&str];

    fn description(&self) -> Option<&'static str> {
        None
    }

    fn rate_limit(&self) -> RateLimiter<u64> {
        RateLimiter::new(4, 20)
    }

    async fn execute(&self, ctx: &CommandContext, arguments: String) -> CommandResult;
}

#[derive(Debug)]
pub enum CommandError {
    Custom(String),
    Telegram(TelegramError),
    Fetch(FetchError),
}

impl From<String> for CommandError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for CommandError {
    fn from(value: &str) -> Self {
        Self::Custom(value.into())
    }
}

impl From<TelegramError> for CommandError {
    fn from(value: TelegramError) -> Self {
        Self::Telegram(value)
    }
}

impl From<FetchError> for CommandError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

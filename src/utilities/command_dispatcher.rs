use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use super::command_context::CommandContext;
use super::command_manager::CommandInstance;
use super::rate_limit::RateLimiter;
use crate::apis::telegram::{TelegramError, TelegramResult};
use crate::commands::CommandError;
use crate::editing::acquirer::FetchError;
use crate::utilities::text_utils;

pub async fn dispatch_command(
    command: Arc<CommandInstance>,
    arguments: String,
    context: CommandContext,
) {
    if let Some(cooldown) = check_rate_limit(&command.rate_limiter, &command, &context) {
        report_rate_limit(&context, cooldown).await;
        return;
    }

    log::info!("running {command} {arguments:?} for {} in {}", context.user, context.chat);

    if let Err(err) = command.command.execute(&context, arguments).await {
        report_command_error(&command, &context, err).await;
    }
}

/// returns the remaining cooldown in seconds if the user exceeded the limit
pub fn check_rate_limit(
    rate_limiter: &Mutex<RateLimiter<u64>>,
    label: impl Display,
    context: &CommandContext,
) -> Option<u64> {
    let cooldown = rate_limiter
        .lock()
        .unwrap()
        .update_rate_limit(context.user.id, context.sent_at())?
        .unsigned_abs();

    log::info!(
        "{label} rate limit exceeded by {} by {}",
        text_utils::format_duration(cooldown),
        context.user
    );

    Some(cooldown)
}

pub async fn report_rate_limit(context: &CommandContext, cooldown: u64) {
    if let Err(err) = send_rate_limit_notice(context, cooldown).await {
        log::error!("Bot API error occurred while reporting a rate limit: {err}");
    }
}

async fn send_rate_limit_notice(context: &CommandContext, cooldown: u64) -> TelegramResult<()> {
    if context
        .bot_state
        .rate_limits
        .lock()
        .unwrap()
        .rate_limit_exceeded
        .update_rate_limit(context.user.id, context.sent_at())
        .is_some()
    {
        return Ok(());
    }

    let cooldown_end = Instant::now() + Duration::from_secs(cooldown.clamp(5, 60));

    let message = context
        .reply(format!("you can use this again in {}.", text_utils::format_duration(cooldown)))
        .await?;

    tokio::time::sleep_until(cooldown_end).await;
    context.delete_message(message).await?;

    Ok(())
}

pub async fn report_command_error(
    label: impl Display,
    context: &CommandContext,
    error: CommandError,
) {
    let text = match error {
        CommandError::Custom(text) => text,
        CommandError::Telegram(err) => {
            log::error!("Bot API error in {label}: {err}");
            match err {
                TelegramError::Api(err) => format!("sending the message failed ({err}) 😔"),
                _ => "sending the message failed 😔".into(),
            }
        }
        CommandError::Fetch(err) => {
            log::warn!("fetching the photo in {label} failed: {err}");
            match err {
                FetchError::TooLarge(_) => "this photo is too large.".into(),
                FetchError::InvalidImage(_) => "this file is not a supported image.".into(),
                FetchError::Expired => "this photo is no longer available, send it again.".into(),
                _ => "the photo could not be downloaded from Telegram.".into(),
            }
        }
    };

    if let Err(err) = context.reply(text).await {
        log::error!("Bot API error occurred while handling the previous error: {err}");
    }
}

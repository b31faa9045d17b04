use crate::commands::CommandResult;
use crate::editing::acquirer;
use crate::editing::flow::{EditJob, FlowState, FlowTracker};
use crate::editing::launch;
use crate::editing::session::PendingRequest;
use crate::editing::variant::GenerationVariant;
use crate::utilities::command_context::CommandContext;
use crate::utilities::{command_dispatcher, telegram_utils, text_utils};

pub async fn photo(ctx: CommandContext) {
    let cooldown = ctx
        .bot_state
        .rate_limits
        .lock()
        .unwrap()
        .photos
        .update_rate_limit(ctx.user.id, ctx.sent_at());

    if let Some(cooldown) = cooldown {
        log::info!("photo rate limit exceeded by {}", ctx.user);
        command_dispatcher::report_rate_limit(&ctx, cooldown.unsigned_abs()).await;
        return;
    }

    if let Err(err) = handle_photo(&ctx).await {
        command_dispatcher::report_command_error("photo", &ctx, err).await;
    }
}

async fn handle_photo(ctx: &CommandContext) -> CommandResult {
    if ctx.bot_state.flows.is_running(ctx.user.id) {
        return Err(launch::FLOW_BUSY.into());
    }

    let photo = ctx
        .message
        .photo()
        .and_then(telegram_utils::largest_photo)
        .ok_or("this photo is empty.")?;
    let caption = ctx.message.caption().map(str::trim).filter(|caption| !caption.is_empty());

    if let Some(issue) = caption.and_then(text_utils::check_prompt) {
        log::info!("prompt rejected: {issue:?}");
        return Err(issue.into());
    }

    log::info!(
        "received a {}x{} photo from {} in {}",
        photo.width,
        photo.height,
        ctx.user,
        ctx.chat
    );
    if let Err(err) = ctx.send_typing().await {
        log::warn!("failed to send a chat action: {err}");
    }

    let source = acquirer::acquire(ctx.bot_state.fetcher.as_ref(), photo).await?;

    if let Some(caption) = caption {
        let job = EditJob {
            variant: GenerationVariant::SINGLE_STEP,
            prompt: caption.into(),
            source: Some(source),
        };

        return launch::launch(ctx, job).await;
    }

    let keyboard = telegram_utils::variant_keyboard(&ctx.bot_state.providers, ctx.user.id);
    ctx.bot_state.sessions.put(PendingRequest::new(ctx.user.id, ctx.chat.id.0, source));
    FlowTracker::new(ctx.user.id).transition(FlowState::AwaitingSelection);

    ctx.reply_custom("how should this photo be edited?".into(), Some(keyboard)).await?;

    Ok(())
}
